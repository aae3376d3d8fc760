use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::db::models::job::{
    active_rework, AssignPersonnel, JobRejection, JobRequest, JobStatus, JobStatusUpdate,
    JobVerification, ReworkAction, ReworkAttempt, ReworkUpdate,
};
use crate::db::models::request::{Request, RequestStatus, RequestType};
use crate::db::queries::request::{get_request_by_id, RequestViewCache};
use crate::middleware::auth::ActorContext;
use crate::utils::api_response::ApiResponse;
use crate::utils::events::{self, EventSender};
use crate::utils::notification;
use crate::workflow::authorize::{require_any_role, DepartmentScope, Role};
use crate::workflow::error::{WorkflowError, WorkflowResult};

async fn get_job_by_request_id(
    tx: &mut Transaction<'_, Postgres>,
    request_id: i32,
) -> WorkflowResult<JobRequest> {
    sqlx::query_as::<_, JobRequest>(
        "SELECT request_id, job_type, location, description, assigned_to, status, \
         verified_by_requester, verified_by_reviewer \
         FROM job_requests WHERE request_id = $1 FOR UPDATE",
    )
    .bind(request_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| WorkflowError::not_found(format!("No job request for request {request_id}")))
}

fn require_job(request: &Request) -> WorkflowResult<()> {
    if request.request_type != RequestType::Job {
        return Err(WorkflowError::validation("This is not a job request"));
    }
    Ok(())
}

fn require_assigned(job: &JobRequest, actor: &ActorContext) -> WorkflowResult<()> {
    if job.assigned_to != Some(actor.user_id) && !actor.is_admin() {
        return Err(WorkflowError::forbidden(
            "Only the assigned personnel may act on this job",
        ));
    }
    Ok(())
}

/// CAS update of the job sub-status; zero rows means a concurrent actor
/// already moved it.
async fn advance_job_status(
    tx: &mut Transaction<'_, Postgres>,
    request_id: i32,
    from: JobStatus,
    to: JobStatus,
) -> WorkflowResult<()> {
    let result = sqlx::query(
        "UPDATE job_requests SET status = $1 WHERE request_id = $2 AND status = $3",
    )
    .bind(to)
    .bind(request_id)
    .bind(from)
    .execute(&mut **tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(WorkflowError::conflict(
            "The job status changed concurrently; please reload and retry",
        ));
    }
    Ok(())
}

fn publish_update(events: &EventSender, request: &Request) {
    events::publish(
        events,
        events::REQUEST_UPDATE,
        request.id,
        request.request_type,
        request.status,
    );
}

#[utoipa::path(
    post,
    path = "/requests/{request_id}/assign",
    params(("request_id" = i32, Path, description = "Request ID")),
    request_body = AssignPersonnel,
    responses(
        (status = 200, description = "Personnel assigned"),
        (status = 403, description = "Actor is not an operations manager"),
        (status = 404, description = "Request or personnel not found"),
        (status = 422, description = "Request is not an assignable job")
    ),
    tag = "Jobs",
    security(("bearerAuth" = []))
)]
pub async fn assign_personnel(
    State(pool): State<PgPool>,
    Extension(actor): Extension<ActorContext>,
    Extension(view_cache): Extension<RequestViewCache>,
    Extension(events): Extension<EventSender>,
    Path(request_id): Path<i32>,
    Json(payload): Json<AssignPersonnel>,
) -> Result<ApiResponse<serde_json::Value>, ApiResponse<()>> {
    require_any_role(&actor, &[Role::OperationsManager], DepartmentScope::Any)?;

    let request = get_request_by_id(&pool, request_id).await?;
    require_job(&request)?;
    if !matches!(
        request.status,
        RequestStatus::Pending | RequestStatus::Reviewed
    ) {
        return Err(WorkflowError::validation(
            "Personnel can only be assigned while the request awaits approval",
        )
        .into());
    }

    let roles: Option<Vec<String>> =
        sqlx::query_scalar("SELECT roles FROM users WHERE id = $1")
            .bind(payload.personnel_id)
            .fetch_optional(&pool)
            .await
            .map_err(WorkflowError::from)?;
    let roles = roles.ok_or_else(|| {
        WorkflowError::not_found(format!("No user with id {}", payload.personnel_id))
    })?;
    if !roles.iter().any(|r| r == Role::Personnel.as_str()) {
        return Err(WorkflowError::validation(
            "The selected user is not field personnel",
        )
        .into());
    }

    let mut tx = pool.begin().await.map_err(WorkflowError::from)?;
    let job = get_job_by_request_id(&mut tx, request_id).await?;
    if job.work_started() {
        return Err(WorkflowError::validation(
            "The job has already started and can no longer be reassigned",
        )
        .into());
    }
    sqlx::query("UPDATE job_requests SET assigned_to = $1 WHERE request_id = $2")
        .bind(payload.personnel_id)
        .bind(request_id)
        .execute(&mut *tx)
        .await
        .map_err(WorkflowError::from)?;
    tx.commit().await.map_err(WorkflowError::from)?;

    view_cache.invalidate(&request_id);
    publish_update(&events, &request);

    if let Err(e) = notification::notify_job_assignment(
        &pool,
        request_id,
        payload.personnel_id,
        &job.job_type,
        &job.location,
    )
    .await
    {
        tracing::warn!("Failed to notify personnel for request {request_id}: {e}");
    }

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Personnel assigned",
        json!({ "request_id": request_id, "assigned_to": payload.personnel_id }),
    ))
}

#[utoipa::path(
    patch,
    path = "/requests/{request_id}/job-status",
    params(("request_id" = i32, Path, description = "Request ID")),
    request_body = JobStatusUpdate,
    responses(
        (status = 200, description = "Job status advanced"),
        (status = 400, description = "Sub-status transition not legal"),
        (status = 403, description = "Actor is not the assigned personnel")
    ),
    tag = "Jobs",
    security(("bearerAuth" = []))
)]
pub async fn update_job_status(
    State(pool): State<PgPool>,
    Extension(actor): Extension<ActorContext>,
    Extension(view_cache): Extension<RequestViewCache>,
    Extension(events): Extension<EventSender>,
    Path(request_id): Path<i32>,
    Json(update): Json<JobStatusUpdate>,
) -> Result<ApiResponse<serde_json::Value>, ApiResponse<()>> {
    let request = get_request_by_id(&pool, request_id).await?;
    require_job(&request)?;
    if request.status != RequestStatus::Approved {
        return Err(WorkflowError::validation(
            "Work can only progress on an approved request",
        )
        .into());
    }
    // rejection and rework move through their dedicated endpoints
    if !matches!(update.target, JobStatus::InProgress | JobStatus::Completed) {
        return Err(WorkflowError::validation(
            "Only 'in_progress' and 'completed' can be set here",
        )
        .into());
    }

    let mut tx = pool.begin().await.map_err(WorkflowError::from)?;
    let job = get_job_by_request_id(&mut tx, request_id).await?;
    require_assigned(&job, &actor)?;
    if !job.status.can_advance_to(update.target) {
        return Err(WorkflowError::InvalidTransition {
            from: job.status.as_str(),
            to: update.target.as_str(),
        }
        .into());
    }
    advance_job_status(&mut tx, request_id, job.status, update.target).await?;
    tx.commit().await.map_err(WorkflowError::from)?;

    view_cache.invalidate(&request_id);
    publish_update(&events, &request);

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Job status advanced",
        json!({ "request_id": request_id, "job_status": update.target }),
    ))
}

#[utoipa::path(
    post,
    path = "/requests/{request_id}/verify",
    params(("request_id" = i32, Path, description = "Request ID")),
    request_body = JobVerification,
    responses(
        (status = 200, description = "Completion verified"),
        (status = 403, description = "Actor is neither the requester nor the reviewer"),
        (status = 422, description = "The job is not completed or was already verified")
    ),
    tag = "Jobs",
    security(("bearerAuth" = []))
)]
pub async fn verify_job_completion(
    State(pool): State<PgPool>,
    Extension(actor): Extension<ActorContext>,
    Extension(view_cache): Extension<RequestViewCache>,
    Extension(events): Extension<EventSender>,
    Path(request_id): Path<i32>,
    Json(payload): Json<JobVerification>,
) -> Result<ApiResponse<serde_json::Value>, ApiResponse<()>> {
    if !payload.verify {
        return Err(WorkflowError::validation("A verification cannot be withdrawn").into());
    }

    let request = get_request_by_id(&pool, request_id).await?;
    require_job(&request)?;

    // the acting side is derived from identity, never from the payload
    let by_requester = if actor.user_id == request.requested_by {
        true
    } else if request.reviewed_by == Some(actor.user_id) || actor.is_operations_manager() {
        false
    } else {
        return Err(WorkflowError::forbidden(
            "Only the requester or the reviewer may verify this job",
        )
        .into());
    };

    let mut tx = pool.begin().await.map_err(WorkflowError::from)?;
    let mut job = get_job_by_request_id(&mut tx, request_id).await?;
    job.record_verification(by_requester)?;

    let column = if by_requester {
        "verified_by_requester"
    } else {
        "verified_by_reviewer"
    };
    sqlx::query(&format!(
        "UPDATE job_requests SET {column} = TRUE WHERE request_id = $1"
    ))
    .bind(request_id)
    .execute(&mut *tx)
    .await
    .map_err(WorkflowError::from)?;

    // both sign-offs close the envelope within the same transaction
    let mut completed = false;
    if job.ready_to_complete() {
        let result = sqlx::query(
            "UPDATE requests SET status = 'completed', completed_at = NOW() \
             WHERE id = $1 AND status = 'approved'",
        )
        .bind(request_id)
        .execute(&mut *tx)
        .await
        .map_err(WorkflowError::from)?;
        if result.rows_affected() == 0 {
            return Err(WorkflowError::conflict(
                "The request was modified concurrently; please reload and retry",
            )
            .into());
        }
        completed = true;
    }
    tx.commit().await.map_err(WorkflowError::from)?;

    view_cache.invalidate(&request_id);
    publish_update(&events, &request);

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Completion verified",
        json!({ "request_id": request_id, "request_completed": completed }),
    ))
}

#[utoipa::path(
    post,
    path = "/requests/{request_id}/reject-job",
    params(("request_id" = i32, Path, description = "Request ID")),
    request_body = JobRejection,
    responses(
        (status = 200, description = "Rework opened", body = ReworkAttempt),
        (status = 403, description = "Actor is not an operations manager"),
        (status = 422, description = "The job is not in a rejectable state")
    ),
    tag = "Jobs",
    security(("bearerAuth" = []))
)]
pub async fn reject_job(
    State(pool): State<PgPool>,
    Extension(actor): Extension<ActorContext>,
    Extension(view_cache): Extension<RequestViewCache>,
    Extension(events): Extension<EventSender>,
    Path(request_id): Path<i32>,
    Json(payload): Json<JobRejection>,
) -> Result<ApiResponse<ReworkAttempt>, ApiResponse<()>> {
    require_any_role(&actor, &[Role::OperationsManager], DepartmentScope::Any)?;
    if payload.reason.trim().is_empty() {
        return Err(WorkflowError::validation("A rejection reason is required").into());
    }

    let request = get_request_by_id(&pool, request_id).await?;
    require_job(&request)?;

    let mut tx = pool.begin().await.map_err(WorkflowError::from)?;
    let job = get_job_by_request_id(&mut tx, request_id).await?;
    if job.status != JobStatus::Completed {
        return Err(WorkflowError::validation(
            "Only completed work can be rejected for rework",
        )
        .into());
    }
    advance_job_status(&mut tx, request_id, JobStatus::Completed, JobStatus::Rejected).await?;

    // both sign-offs start over after a rejection
    sqlx::query(
        "UPDATE job_requests SET verified_by_requester = FALSE, verified_by_reviewer = FALSE \
         WHERE request_id = $1",
    )
    .bind(request_id)
    .execute(&mut *tx)
    .await
    .map_err(WorkflowError::from)?;

    let attempt = sqlx::query_as::<_, ReworkAttempt>(
        "INSERT INTO rework_attempts (job_request_id, rejection_reason) VALUES ($1, $2) \
         RETURNING id, job_request_id, rejection_reason, rework_start_date, rework_end_date, \
                   resolved, created_at",
    )
    .bind(request_id)
    .bind(payload.reason.trim())
    .fetch_one(&mut *tx)
    .await
    .map_err(WorkflowError::from)?;

    tx.commit().await.map_err(WorkflowError::from)?;

    view_cache.invalidate(&request_id);
    publish_update(&events, &request);

    if let Some(personnel_id) = job.assigned_to {
        if let Err(e) =
            notification::notify_rework_requested(&pool, request_id, personnel_id, payload.reason.trim())
                .await
        {
            tracing::warn!("Failed to notify personnel of rework for request {request_id}: {e}");
        }
    }

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Rework opened",
        attempt,
    ))
}

#[utoipa::path(
    patch,
    path = "/rework/{rework_id}",
    params(("rework_id" = i32, Path, description = "Rework attempt ID")),
    request_body = ReworkUpdate,
    responses(
        (status = 200, description = "Rework attempt updated"),
        (status = 403, description = "Actor is not the assigned personnel"),
        (status = 409, description = "Not the active rework attempt"),
        (status = 422, description = "The attempt is not in the right phase")
    ),
    tag = "Jobs",
    security(("bearerAuth" = []))
)]
pub async fn update_rework(
    State(pool): State<PgPool>,
    Extension(actor): Extension<ActorContext>,
    Extension(view_cache): Extension<RequestViewCache>,
    Extension(events): Extension<EventSender>,
    Path(rework_id): Path<i32>,
    Json(update): Json<ReworkUpdate>,
) -> Result<ApiResponse<serde_json::Value>, ApiResponse<()>> {
    let row = sqlx::query("SELECT job_request_id FROM rework_attempts WHERE id = $1")
        .bind(rework_id)
        .fetch_optional(&pool)
        .await
        .map_err(WorkflowError::from)?;
    let request_id: i32 = row
        .ok_or_else(|| WorkflowError::not_found(format!("No rework attempt with id {rework_id}")))?
        .get("job_request_id");

    let request = get_request_by_id(&pool, request_id).await?;

    let mut tx = pool.begin().await.map_err(WorkflowError::from)?;
    let job = get_job_by_request_id(&mut tx, request_id).await?;
    require_assigned(&job, &actor)?;

    // only the newest unresolved attempt may move; acting on a stale one
    // is a conflict, not a silent success
    let attempts = sqlx::query_as::<_, ReworkAttempt>(
        "SELECT id, job_request_id, rejection_reason, rework_start_date, rework_end_date, \
         resolved, created_at FROM rework_attempts WHERE job_request_id = $1 \
         ORDER BY created_at, id",
    )
    .bind(request_id)
    .fetch_all(&mut *tx)
    .await
    .map_err(WorkflowError::from)?;
    let active = active_rework(&attempts)
        .ok_or_else(|| WorkflowError::validation("The job has no unresolved rework attempt"))?;
    if active.id != rework_id {
        return Err(WorkflowError::conflict(
            "A newer rework attempt supersedes this one",
        )
        .into());
    }

    match update.action {
        ReworkAction::Start => {
            advance_job_status(
                &mut tx,
                request_id,
                JobStatus::Rejected,
                JobStatus::ReworkInProgress,
            )
            .await?;
            let result = sqlx::query(
                "UPDATE rework_attempts SET rework_start_date = NOW() \
                 WHERE id = $1 AND rework_start_date IS NULL",
            )
            .bind(rework_id)
            .execute(&mut *tx)
            .await
            .map_err(WorkflowError::from)?;
            if result.rows_affected() == 0 {
                return Err(
                    WorkflowError::validation("The rework has already been started").into(),
                );
            }
        }
        ReworkAction::Finish => {
            advance_job_status(
                &mut tx,
                request_id,
                JobStatus::ReworkInProgress,
                JobStatus::Completed,
            )
            .await?;
            let result = sqlx::query(
                "UPDATE rework_attempts SET rework_end_date = NOW(), resolved = TRUE \
                 WHERE id = $1 AND rework_start_date IS NOT NULL AND rework_end_date IS NULL",
            )
            .bind(rework_id)
            .execute(&mut *tx)
            .await
            .map_err(WorkflowError::from)?;
            if result.rows_affected() == 0 {
                return Err(WorkflowError::validation(
                    "The rework was never started or is already finished",
                )
                .into());
            }
        }
    }

    tx.commit().await.map_err(WorkflowError::from)?;

    view_cache.invalidate(&request_id);
    publish_update(&events, &request);

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Rework attempt updated",
        json!({ "request_id": request_id, "rework_id": rework_id }),
    ))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(
        assign_personnel,
        update_job_status,
        verify_job_completion,
        reject_job,
        update_rework
    ),
    components(schemas(
        JobRequest,
        JobStatus,
        AssignPersonnel,
        JobStatusUpdate,
        JobVerification,
        JobRejection,
        ReworkUpdate,
        ReworkAttempt
    )),
    tags(
        (name = "Jobs", description = "Job assignment, verification and rework")
    )
)]
pub struct JobDoc;
