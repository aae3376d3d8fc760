use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};

use crate::db::models::borrow::{ReturnAction, ReturnableAction, ReturnableRequest};
use crate::db::models::request::{Request, RequestStatus, RequestType};
use crate::db::models::resource::ResourceStatus;
use crate::db::queries::request::{complete_envelope, get_request_by_id, RequestViewCache};
use crate::middleware::auth::ActorContext;
use crate::utils::api_response::ApiResponse;
use crate::utils::events::{self, EventSender};
use crate::utils::notification;
use crate::workflow::authorize::{require_any_role, DepartmentScope, Role};
use crate::workflow::error::{WorkflowError, WorkflowResult};

async fn get_returnable_request(
    tx: &mut Transaction<'_, Postgres>,
    request_id: i32,
) -> WorkflowResult<ReturnableRequest> {
    sqlx::query_as::<_, ReturnableRequest>(
        "SELECT request_id, item_id, date_and_time_needed, return_date_and_time, in_progress, \
         is_returned, actual_return_date, return_condition, is_lost, lost_reason \
         FROM returnable_requests WHERE request_id = $1 FOR UPDATE",
    )
    .bind(request_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| {
        WorkflowError::not_found(format!("No borrow request for request {request_id}"))
    })
}

fn require_borrow(request: &Request) -> WorkflowResult<()> {
    if request.request_type != RequestType::Borrow {
        return Err(WorkflowError::validation("This is not a borrow request"));
    }
    Ok(())
}

async fn set_item_status(
    tx: &mut Transaction<'_, Postgres>,
    item_id: i32,
    status: ResourceStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE borrowable_items SET status = $1 WHERE id = $2")
        .bind(status)
        .bind(item_id)
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
    path = "/requests/{request_id}/borrow/pickup",
    params(("request_id" = i32, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Item handed over"),
        (status = 403, description = "Actor is not an operations manager"),
        (status = 422, description = "Loan is not in a pickup-able state")
    ),
    tag = "Borrow",
    security(("bearerAuth" = []))
)]
pub async fn pickup_item(
    State(pool): State<PgPool>,
    Extension(actor): Extension<ActorContext>,
    Extension(view_cache): Extension<RequestViewCache>,
    Extension(events): Extension<EventSender>,
    Path(request_id): Path<i32>,
) -> Result<ApiResponse<serde_json::Value>, ApiResponse<()>> {
    require_any_role(&actor, &[Role::OperationsManager], DepartmentScope::Any)?;

    let request = get_request_by_id(&pool, request_id).await?;
    require_borrow(&request)?;
    if request.status != RequestStatus::Approved {
        return Err(
            WorkflowError::validation("Only an approved loan can be picked up").into(),
        );
    }

    let mut tx = pool.begin().await.map_err(WorkflowError::from)?;
    let mut loan = get_returnable_request(&mut tx, request_id).await?;
    loan.pick_up()?;

    sqlx::query("UPDATE returnable_requests SET in_progress = TRUE WHERE request_id = $1")
        .bind(request_id)
        .execute(&mut *tx)
        .await
        .map_err(WorkflowError::from)?;
    set_item_status(&mut tx, loan.item_id, ResourceStatus::InUse)
        .await
        .map_err(WorkflowError::from)?;
    tx.commit().await.map_err(WorkflowError::from)?;

    view_cache.invalidate(&request_id);
    publish_update(&events, &request, request.status);

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Item handed over",
        json!({ "request_id": request_id }),
    ))
}

#[utoipa::path(
    post,
    path = "/requests/{request_id}/borrow/return",
    params(("request_id" = i32, Path, description = "Request ID")),
    request_body = ReturnableAction,
    responses(
        (status = 200, description = "Loan closed"),
        (status = 403, description = "Actor is not an operations manager"),
        (status = 422, description = "Missing condition/reason or loan not open")
    ),
    tag = "Borrow",
    security(("bearerAuth" = []))
)]
pub async fn return_item(
    State(pool): State<PgPool>,
    Extension(actor): Extension<ActorContext>,
    Extension(view_cache): Extension<RequestViewCache>,
    Extension(events): Extension<EventSender>,
    Path(request_id): Path<i32>,
    Json(payload): Json<ReturnableAction>,
) -> Result<ApiResponse<serde_json::Value>, ApiResponse<()>> {
    require_any_role(&actor, &[Role::OperationsManager], DepartmentScope::Any)?;

    let request = get_request_by_id(&pool, request_id).await?;
    require_borrow(&request)?;

    let mut tx = pool.begin().await.map_err(WorkflowError::from)?;
    let mut loan = get_returnable_request(&mut tx, request_id).await?;
    let now = Utc::now().naive_utc();

    let body = match payload.action {
        ReturnAction::Return => {
            let condition = payload.return_condition.as_deref().unwrap_or_default();
            let overdue = loan.finalize_return(condition, now)?;
            sqlx::query(
                "UPDATE returnable_requests SET in_progress = FALSE, is_returned = TRUE, \
                 actual_return_date = $1, return_condition = $2 WHERE request_id = $3",
            )
            .bind(now)
            .bind(loan.return_condition.as_deref())
            .bind(request_id)
            .execute(&mut *tx)
            .await
            .map_err(WorkflowError::from)?;
            // the item goes straight back into circulation
            set_item_status(&mut tx, loan.item_id, ResourceStatus::Available)
                .await
                .map_err(WorkflowError::from)?;
            json!({ "request_id": request_id, "is_overdue": overdue })
        }
        ReturnAction::Lost => {
            let reason = payload.lost_reason.as_deref().unwrap_or_default();
            loan.mark_lost(reason)?;
            sqlx::query(
                "UPDATE returnable_requests SET in_progress = FALSE, is_lost = TRUE, \
                 lost_reason = $1 WHERE request_id = $2",
            )
            .bind(loan.lost_reason.as_deref())
            .bind(request_id)
            .execute(&mut *tx)
            .await
            .map_err(WorkflowError::from)?;
            // a lost item stays out of circulation until it is written off
            set_item_status(&mut tx, loan.item_id, ResourceStatus::UnderMaintenance)
                .await
                .map_err(WorkflowError::from)?;
            json!({ "request_id": request_id, "is_lost": true })
        }
    };

    complete_envelope(&mut tx, &request, &actor).await?;
    tx.commit().await.map_err(WorkflowError::from)?;

    view_cache.invalidate(&request_id);
    publish_update(&events, &request, RequestStatus::Completed);

    if let Err(e) =
        notification::notify_request_decision(&pool, &request, RequestStatus::Completed, None).await
    {
        tracing::warn!("Failed to notify requester of request {request_id}: {e}");
    }

    Ok(ApiResponse::success(StatusCode::OK, "Loan closed", body))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(pickup_item, return_item),
    components(schemas(ReturnableRequest, ReturnableAction)),
    tags(
        (name = "Borrow", description = "Borrowable item pickup and return")
    )
)]
pub struct BorrowDoc;
