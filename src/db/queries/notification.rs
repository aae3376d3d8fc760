// src/db/queries/notification.rs
use axum::{
    extract::{Extension, State},
    http::StatusCode,
};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::models::notification::Notification;
use crate::middleware::auth::ActorContext;
use crate::utils::api_response::ApiResponse;
use crate::workflow::error::WorkflowError;

#[utoipa::path(
    get,
    path = "/notifications",
    responses(
        (status = 200, description = "Current actor's notifications", body = Vec<Notification>)
    ),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn get_my_notifications(
    State(pool): State<PgPool>,
    Extension(actor): Extension<ActorContext>,
) -> Result<ApiResponse<Vec<Notification>>, ApiResponse<()>> {
    let mut qb = QueryBuilder::<Postgres>::new(
        "SELECT DISTINCT n.id, n.title, n.body, n.type, n.action_type, n.action_data, \
         n.dismissible, n.created_at, n.expires_at \
         FROM notifications n \
         JOIN notification_targets t ON t.notification_id = n.id \
         WHERE (n.expires_at IS NULL OR n.expires_at > NOW()) AND (",
    );
    qb.push("(t.scope = 'user' AND t.target_id = ");
    qb.push_bind(actor.user_id);
    qb.push(")");
    if let Some(department_id) = actor.department_id {
        qb.push(" OR (t.scope = 'department' AND t.target_id = ");
        qb.push_bind(department_id);
        qb.push(")");
    }
    if !actor.headed_departments.is_empty() {
        qb.push(" OR (t.scope = 'department_heads' AND t.target_id = ANY(");
        qb.push_bind(actor.headed_departments.clone());
        qb.push("))");
    }
    qb.push(") ORDER BY n.created_at DESC");

    let notifications = qb
        .build_query_as::<Notification>()
        .fetch_all(&pool)
        .await
        .map_err(WorkflowError::from)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Notifications",
        notifications,
    ))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(get_my_notifications),
    components(schemas(Notification)),
    tags(
        (name = "Notifications", description = "Store-backed notification fan-out")
    )
)]
pub struct NotificationDoc;
