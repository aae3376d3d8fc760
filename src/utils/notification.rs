use chrono::Utc;
use serde_json::{json, Value};
use sqlx::{PgPool, Row};

use crate::db::models::notification::{NotificationScope, NotificationTargetInput};
use crate::db::models::request::{Request, RequestStatus};

/// Result type for notification operations
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors that can occur in notification operations
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid target provided: {0}")]
    InvalidTarget(String),
}

/// Notification builder for creating system notifications
pub struct NotificationBuilder {
    title: String,
    body: Option<String>,
    notification_type: String,
    targets: Vec<NotificationTargetInput>,
    action_type: Option<String>,
    action_data: Option<Value>,
    dismissible: bool,
    expires_in_days: Option<i64>,
}

impl NotificationBuilder {
    /// Create a new notification builder with required fields
    pub fn new(title: impl Into<String>, notification_type: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: None,
            notification_type: notification_type.into(),
            targets: Vec::new(),
            action_type: None,
            action_data: None,
            dismissible: true,
            expires_in_days: Some(14), // Default to 14 days
        }
    }

    /// Set notification body
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Add a target user to the notification
    pub fn target_user(mut self, user_id: i32) -> Self {
        self.targets.push(NotificationTargetInput {
            scope: NotificationScope::User,
            target_id: user_id,
        });
        self
    }

    /// Add multiple target users to the notification
    pub fn target_users(mut self, user_ids: Vec<i32>) -> Self {
        for user_id in user_ids {
            self.targets.push(NotificationTargetInput {
                scope: NotificationScope::User,
                target_id: user_id,
            });
        }
        self
    }

    /// Add a whole department as a target
    pub fn target_department(mut self, department_id: i32) -> Self {
        self.targets.push(NotificationTargetInput {
            scope: NotificationScope::Department,
            target_id: department_id,
        });
        self
    }

    /// Add a department's head as a target
    pub fn target_department_heads(mut self, department_id: i32) -> Self {
        self.targets.push(NotificationTargetInput {
            scope: NotificationScope::DepartmentHeads,
            target_id: department_id,
        });
        self
    }

    /// Set the action type and data for when notification is clicked
    pub fn action(mut self, action_type: impl Into<String>, action_data: Value) -> Self {
        self.action_type = Some(action_type.into());
        self.action_data = Some(action_data);
        self
    }

    /// Set whether the notification can be dismissed
    pub fn dismissible(mut self, dismissible: bool) -> Self {
        self.dismissible = dismissible;
        self
    }

    /// Set expiration time in days (None means no expiration)
    pub fn expires_in_days(mut self, days: Option<i64>) -> Self {
        self.expires_in_days = days;
        self
    }

    /// Build and send the notification
    pub async fn send(self, pool: &PgPool) -> NotificationResult<i32> {
        // Validate required fields
        if self.targets.is_empty() {
            return Err(NotificationError::InvalidTarget(
                "At least one target is required".to_string(),
            ));
        }

        // Calculate expiration date if provided
        let expires_at = self
            .expires_in_days
            .map(|days| (Utc::now() + chrono::Duration::days(days)).naive_utc());

        // Start a transaction
        let mut tx = pool.begin().await?;

        // Insert notification
        let notification_id: i32 = sqlx::query(
            r#"
            INSERT INTO notifications (title, body, type, action_type, action_data, dismissible, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&self.title)
        .bind(&self.body)
        .bind(&self.notification_type)
        .bind(&self.action_type)
        .bind(&self.action_data)
        .bind(self.dismissible)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?
        .get("id");

        // Insert targets
        for target in &self.targets {
            sqlx::query(
                "INSERT INTO notification_targets (notification_id, scope, target_id) VALUES ($1, $2, $3)",
            )
            .bind(notification_id)
            .bind(target.scope.as_str())
            .bind(target.target_id)
            .execute(&mut *tx)
            .await?;
        }

        // Commit transaction
        tx.commit().await?;

        Ok(notification_id)
    }
}

/// Common notification types for system usage
pub mod notification_types {
    pub const REQUEST_SUBMITTED: &str = "request_submitted";
    pub const REQUEST_DECISION: &str = "request_decision";
    pub const HEAD_APPROVAL_NEEDED: &str = "head_approval_needed";
    pub const JOB_ASSIGNMENT: &str = "job_assignment";
    pub const REWORK_REQUESTED: &str = "rework_requested";
}

/// Notify every operations manager that a new request needs review.
pub async fn notify_request_submitted(
    pool: &PgPool,
    request: &Request,
    requester_name: &str,
) -> NotificationResult<i32> {
    let reviewers = sqlx::query("SELECT id FROM users WHERE 'operations_manager' = ANY(roles)")
        .fetch_all(pool)
        .await?;
    let reviewer_ids: Vec<i32> = reviewers.iter().map(|row| row.get("id")).collect();

    NotificationBuilder::new(
        format!(
            "New {} request from {}",
            request.request_type.as_str(),
            requester_name
        ),
        notification_types::REQUEST_SUBMITTED,
    )
    .body(format!("Request #{} is awaiting review", request.id))
    .target_users(reviewer_ids)
    .action("view_request", json!({ "request_id": request.id }))
    .send(pool)
    .await
}

/// Notify the requester that their request changed status.
pub async fn notify_request_decision(
    pool: &PgPool,
    request: &Request,
    new_status: RequestStatus,
    reason: Option<&str>,
) -> NotificationResult<i32> {
    let mut builder = NotificationBuilder::new(
        format!("Request #{} is now {}", request.id, new_status.as_str()),
        notification_types::REQUEST_DECISION,
    )
    .target_user(request.requested_by)
    .action("view_request", json!({ "request_id": request.id }));

    if let Some(reason) = reason {
        builder = builder.body(reason.to_string());
    }

    builder.send(pool).await
}

/// Ask the head of the venue's owning department to decide on a booking.
pub async fn notify_head_approval_needed(
    pool: &PgPool,
    request: &Request,
    owning_department_id: i32,
    venue_name: &str,
) -> NotificationResult<i32> {
    NotificationBuilder::new(
        format!("Venue booking needs your approval: {venue_name}"),
        notification_types::HEAD_APPROVAL_NEEDED,
    )
    .body(format!(
        "Request #{} books a venue owned by your department",
        request.id
    ))
    .target_department_heads(owning_department_id)
    .action("head_approval", json!({ "request_id": request.id }))
    .dismissible(false) // Can't dismiss pending approvals
    .send(pool)
    .await
}

/// Tell assigned personnel they have a job.
pub async fn notify_job_assignment(
    pool: &PgPool,
    request_id: i32,
    personnel_id: i32,
    job_type: &str,
    location: &str,
) -> NotificationResult<i32> {
    NotificationBuilder::new(
        format!("Job assigned: {job_type}"),
        notification_types::JOB_ASSIGNMENT,
    )
    .body(format!("Job request #{request_id} at {location}"))
    .target_user(personnel_id)
    .action("view_request", json!({ "request_id": request_id }))
    .send(pool)
    .await
}

/// Tell assigned personnel their completed work was rejected for rework.
pub async fn notify_rework_requested(
    pool: &PgPool,
    request_id: i32,
    personnel_id: i32,
    reason: &str,
) -> NotificationResult<i32> {
    NotificationBuilder::new(
        "Completed work was rejected",
        notification_types::REWORK_REQUESTED,
    )
    .body(reason.to_string())
    .target_user(personnel_id)
    .action("view_request", json!({ "request_id": request_id }))
    .dismissible(false)
    .send(pool)
    .await
}
