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
use crate::db::models::transport::{OdometerReading, TransportRequest};
use crate::db::queries::request::{complete_envelope, get_request_by_id, RequestViewCache};
use crate::middleware::auth::ActorContext;
use crate::utils::api_response::ApiResponse;
use crate::utils::events::{self, EventSender};
use crate::utils::notification;
use crate::workflow::authorize::{require_any_role, DepartmentScope, Role};
use crate::workflow::error::{WorkflowError, WorkflowResult};

async fn get_transport_request(
    tx: &mut Transaction<'_, Postgres>,
    request_id: i32,
) -> WorkflowResult<TransportRequest> {
    sqlx::query_as::<_, TransportRequest>(
        "SELECT request_id, vehicle_id, date_and_time_needed, estimated_end_time, destination, \
         in_progress, actual_start, odometer_start, odometer_end, total_distance_travelled \
         FROM transport_requests WHERE request_id = $1 FOR UPDATE",
    )
    .bind(request_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| {
        WorkflowError::not_found(format!("No transport request for request {request_id}"))
    })
}

fn require_transport(request: &Request) -> WorkflowResult<()> {
    if request.request_type != RequestType::Transport {
        return Err(WorkflowError::validation("This is not a transport request"));
    }
    Ok(())
}

async fn set_vehicle_status(
    tx: &mut Transaction<'_, Postgres>,
    vehicle_id: i32,
    status: ResourceStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE vehicles SET status = $1 WHERE id = $2")
        .bind(status)
        .bind(vehicle_id)
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
    path = "/requests/{request_id}/transport/start",
    params(("request_id" = i32, Path, description = "Request ID")),
    request_body = OdometerReading,
    responses(
        (status = 200, description = "Trip started"),
        (status = 403, description = "Actor is not an operations manager"),
        (status = 422, description = "Trip not startable or bad odometer reading")
    ),
    tag = "Transport",
    security(("bearerAuth" = []))
)]
pub async fn start_transport_request(
    State(pool): State<PgPool>,
    Extension(actor): Extension<ActorContext>,
    Extension(view_cache): Extension<RequestViewCache>,
    Extension(events): Extension<EventSender>,
    Path(request_id): Path<i32>,
    Json(payload): Json<OdometerReading>,
) -> Result<ApiResponse<serde_json::Value>, ApiResponse<()>> {
    require_any_role(&actor, &[Role::OperationsManager], DepartmentScope::Any)?;

    let request = get_request_by_id(&pool, request_id).await?;
    require_transport(&request)?;
    if request.status != RequestStatus::Approved {
        return Err(WorkflowError::validation("Only an approved trip can be started").into());
    }

    let mut tx = pool.begin().await.map_err(WorkflowError::from)?;
    let mut transport = get_transport_request(&mut tx, request_id).await?;
    let now = Utc::now().naive_utc();
    transport.start_trip(payload.odometer, now)?;

    sqlx::query(
        "UPDATE transport_requests SET in_progress = TRUE, actual_start = $1, odometer_start = $2 \
         WHERE request_id = $3",
    )
    .bind(now)
    .bind(payload.odometer)
    .bind(request_id)
    .execute(&mut *tx)
    .await
    .map_err(WorkflowError::from)?;
    set_vehicle_status(&mut tx, transport.vehicle_id, ResourceStatus::InUse)
        .await
        .map_err(WorkflowError::from)?;
    tx.commit().await.map_err(WorkflowError::from)?;

    view_cache.invalidate(&request_id);
    publish_update(&events, &request, request.status);

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Trip started",
        json!({ "request_id": request_id, "actual_start": now, "odometer_start": payload.odometer }),
    ))
}

#[utoipa::path(
    post,
    path = "/requests/{request_id}/transport/complete",
    params(("request_id" = i32, Path, description = "Request ID")),
    request_body = OdometerReading,
    responses(
        (status = 200, description = "Trip completed with computed distance"),
        (status = 403, description = "Actor is not an operations manager"),
        (status = 422, description = "Trip not in progress or bad odometer reading")
    ),
    tag = "Transport",
    security(("bearerAuth" = []))
)]
pub async fn complete_transport_request(
    State(pool): State<PgPool>,
    Extension(actor): Extension<ActorContext>,
    Extension(view_cache): Extension<RequestViewCache>,
    Extension(events): Extension<EventSender>,
    Path(request_id): Path<i32>,
    Json(payload): Json<OdometerReading>,
) -> Result<ApiResponse<serde_json::Value>, ApiResponse<()>> {
    let request = get_request_by_id(&pool, request_id).await?;
    require_transport(&request)?;

    let mut tx = pool.begin().await.map_err(WorkflowError::from)?;
    let mut transport = get_transport_request(&mut tx, request_id).await?;
    let distance = transport.complete_trip(payload.odometer)?;

    sqlx::query(
        "UPDATE transport_requests SET in_progress = FALSE, odometer_end = $1, \
         total_distance_travelled = $2 WHERE request_id = $3",
    )
    .bind(payload.odometer)
    .bind(distance)
    .bind(request_id)
    .execute(&mut *tx)
    .await
    .map_err(WorkflowError::from)?;
    set_vehicle_status(&mut tx, transport.vehicle_id, ResourceStatus::Available)
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
        "Trip completed",
        json!({ "request_id": request_id, "total_distance_travelled": distance }),
    ))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(start_transport_request, complete_transport_request),
    components(schemas(TransportRequest, OdometerReading)),
    tags(
        (name = "Transport", description = "Vehicle trip lifecycle with odometer capture")
    )
)]
pub struct TransportDoc;
