use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};

use crate::db::models::request::{Request, RequestStatus, RequestType};
use crate::db::models::resource::ResourceStatus;
use crate::db::models::venue::{HeadApproval, VenueRequest};
use crate::db::queries::request::{complete_envelope, get_request_by_id, RequestViewCache};
use crate::middleware::auth::ActorContext;
use crate::utils::api_response::ApiResponse;
use crate::utils::events::{self, EventSender};
use crate::utils::notification;
use crate::workflow::authorize::{require_any_role, DepartmentScope, Role};
use crate::workflow::error::{WorkflowError, WorkflowResult};

async fn get_venue_request(
    tx: &mut Transaction<'_, Postgres>,
    request_id: i32,
) -> WorkflowResult<VenueRequest> {
    sqlx::query_as::<_, VenueRequest>(
        "SELECT request_id, venue_id, start_time, end_time, approved_by_head, in_progress, \
         actual_start, actual_end_time, setup_requirements \
         FROM venue_requests WHERE request_id = $1 FOR UPDATE",
    )
    .bind(request_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| WorkflowError::not_found(format!("No venue request for request {request_id}")))
}

fn require_venue(request: &Request) -> WorkflowResult<()> {
    if request.request_type != RequestType::Venue {
        return Err(WorkflowError::validation("This is not a venue request"));
    }
    Ok(())
}

async fn set_venue_status(
    tx: &mut Transaction<'_, Postgres>,
    venue_id: i32,
    status: ResourceStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE venues SET status = $1 WHERE id = $2")
        .bind(status)
        .bind(venue_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn publish_update(events: &EventSender, request: &Request, status: RequestStatus) {
    events::publish(
        events,
        events::REQUEST_UPDATE,
        request.id,
        request.request_type,
        status,
    );
}

#[utoipa::path(
    post,
    path = "/requests/{request_id}/head-approval",
    params(("request_id" = i32, Path, description = "Request ID")),
    request_body = HeadApproval,
    responses(
        (status = 200, description = "Head decision recorded"),
        (status = 403, description = "Actor does not head the venue's owning department"),
        (status = 422, description = "The gate was already decided")
    ),
    tag = "Venues",
    security(("bearerAuth" = []))
)]
pub async fn head_approval(
    State(pool): State<PgPool>,
    Extension(actor): Extension<ActorContext>,
    Extension(view_cache): Extension<RequestViewCache>,
    Extension(events): Extension<EventSender>,
    Path(request_id): Path<i32>,
    Json(payload): Json<HeadApproval>,
) -> Result<ApiResponse<serde_json::Value>, ApiResponse<()>> {
    let request = get_request_by_id(&pool, request_id).await?;
    require_venue(&request)?;
    if request.status != RequestStatus::Pending {
        return Err(WorkflowError::validation(
            "The head gate applies only while the request is pending",
        )
        .into());
    }

    let mut tx = pool.begin().await.map_err(WorkflowError::from)?;
    let mut venue_request = get_venue_request(&mut tx, request_id).await?;

    let (owning_department,): (i32,) =
        sqlx::query_as("SELECT department_id FROM venues WHERE id = $1")
            .bind(venue_request.venue_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(WorkflowError::from)?;

    // the gate belongs to the venue's owning department, not the requester's
    require_any_role(
        &actor,
        &[Role::DepartmentHead],
        DepartmentScope::Exactly(owning_department),
    )?;

    venue_request.record_head_decision(payload.approved)?;
    sqlx::query("UPDATE venue_requests SET approved_by_head = $1 WHERE request_id = $2")
        .bind(payload.approved)
        .bind(request_id)
        .execute(&mut *tx)
        .await
        .map_err(WorkflowError::from)?;

    // a declined gate rejects the whole request
    let mut new_status = request.status;
    let mut reason_text: Option<String> = None;
    if !payload.approved {
        let reason = payload
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or("Declined by the venue's department head")
            .to_string();
        let result = sqlx::query(
            "UPDATE requests SET status = 'rejected', rejection_reason = $1 \
             WHERE id = $2 AND status = 'pending'",
        )
        .bind(&reason)
        .execute(&mut *tx)
        .await
        .map_err(WorkflowError::from)?;
        if result.rows_affected() == 0 {
            return Err(WorkflowError::conflict(
                "The request was modified concurrently; please reload and retry",
            )
            .into());
        }
        new_status = RequestStatus::Rejected;
        reason_text = Some(reason);
    }

    tx.commit().await.map_err(WorkflowError::from)?;

    view_cache.invalidate(&request_id);
    publish_update(&events, &request, new_status);

    if new_status == RequestStatus::Rejected {
        if let Err(e) = notification::notify_request_decision(
            &pool,
            &request,
            new_status,
            reason_text.as_deref(),
        )
        .await
        {
            tracing::warn!("Failed to notify requester of request {request_id}: {e}");
        }
    }

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Head decision recorded",
        json!({ "request_id": request_id, "approved": payload.approved }),
    ))
}

#[utoipa::path(
    post,
    path = "/requests/{request_id}/venue/start",
    params(("request_id" = i32, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Venue use started"),
        (status = 403, description = "Actor is not an operations manager"),
        (status = 422, description = "Not startable yet")
    ),
    tag = "Venues",
    security(("bearerAuth" = []))
)]
pub async fn start_venue_use(
    State(pool): State<PgPool>,
    Extension(actor): Extension<ActorContext>,
    Extension(view_cache): Extension<RequestViewCache>,
    Extension(events): Extension<EventSender>,
    Path(request_id): Path<i32>,
) -> Result<ApiResponse<serde_json::Value>, ApiResponse<()>> {
    require_any_role(&actor, &[Role::OperationsManager], DepartmentScope::Any)?;

    let request = get_request_by_id(&pool, request_id).await?;
    require_venue(&request)?;
    if request.status != RequestStatus::Approved {
        return Err(
            WorkflowError::validation("Only an approved booking can be started").into(),
        );
    }

    let mut tx = pool.begin().await.map_err(WorkflowError::from)?;
    let mut venue_request = get_venue_request(&mut tx, request_id).await?;
    let now = Utc::now().naive_utc();
    venue_request.start_use(now)?;

    sqlx::query(
        "UPDATE venue_requests SET in_progress = TRUE, actual_start = $1 WHERE request_id = $2",
    )
    .bind(now)
    .bind(request_id)
    .execute(&mut *tx)
    .await
    .map_err(WorkflowError::from)?;
    set_venue_status(&mut tx, venue_request.venue_id, ResourceStatus::InUse)
        .await
        .map_err(WorkflowError::from)?;
    tx.commit().await.map_err(WorkflowError::from)?;

    view_cache.invalidate(&request_id);
    publish_update(&events, &request, request.status);

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Venue use started",
        json!({ "request_id": request_id, "actual_start": now }),
    ))
}

#[utoipa::path(
    post,
    path = "/requests/{request_id}/venue/complete",
    params(("request_id" = i32, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Venue request completed"),
        (status = 403, description = "Actor is not an operations manager"),
        (status = 422, description = "Venue use never started")
    ),
    tag = "Venues",
    security(("bearerAuth" = []))
)]
pub async fn complete_venue_request(
    State(pool): State<PgPool>,
    Extension(actor): Extension<ActorContext>,
    Extension(view_cache): Extension<RequestViewCache>,
    Extension(events): Extension<EventSender>,
    Path(request_id): Path<i32>,
) -> Result<ApiResponse<serde_json::Value>, ApiResponse<()>> {
    let request = get_request_by_id(&pool, request_id).await?;
    require_venue(&request)?;

    let mut tx = pool.begin().await.map_err(WorkflowError::from)?;
    let mut venue_request = get_venue_request(&mut tx, request_id).await?;
    let now = Utc::now().naive_utc();
    venue_request.finish_use(now)?;

    sqlx::query(
        "UPDATE venue_requests SET in_progress = FALSE, actual_end_time = $1 WHERE request_id = $2",
    )
    .bind(now)
    .bind(request_id)
    .execute(&mut *tx)
    .await
    .map_err(WorkflowError::from)?;
    set_venue_status(&mut tx, venue_request.venue_id, ResourceStatus::Available)
        .await
        .map_err(WorkflowError::from)?;
    complete_envelope(&mut tx, &request, &actor).await?;
    tx.commit().await.map_err(WorkflowError::from)?;

    view_cache.invalidate(&request_id);
    publish_update(&events, &request, RequestStatus::Completed);

    if let Err(e) =
        notification::notify_request_decision(&pool, &request, RequestStatus::Completed, None).await
    {
        tracing::warn!("Failed to notify requester of request {request_id}: {e}");
    }

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Venue request completed",
        json!({ "request_id": request_id, "actual_end_time": now }),
    ))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(head_approval, start_venue_use, complete_venue_request),
    components(schemas(VenueRequest, HeadApproval)),
    tags(
        (name = "Venues", description = "Venue booking gate and usage lifecycle")
    )
)]
pub struct VenueDoc;
