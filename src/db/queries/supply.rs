use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::json;
use sqlx::{PgPool, Row};

use crate::db::models::request::{Request, RequestStatus, RequestType};
use crate::db::models::supply::SupplyRequest;
use crate::db::queries::request::{complete_envelope, get_request_by_id, RequestViewCache};
use crate::middleware::auth::ActorContext;
use crate::utils::api_response::ApiResponse;
use crate::utils::events::{self, EventSender};
use crate::utils::notification;
use crate::workflow::authorize::{require_any_role, DepartmentScope, Role};
use crate::workflow::error::{WorkflowError, WorkflowResult};

fn require_supply(request: &Request) -> WorkflowResult<()> {
    if request.request_type != RequestType::Supply {
        return Err(WorkflowError::validation("This is not a supply request"));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/requests/{request_id}/supply/pickup",
    params(("request_id" = i32, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Supplies marked picked up, stock deducted"),
        (status = 403, description = "Actor is not an operations manager"),
        (status = 422, description = "Already picked up or insufficient stock")
    ),
    tag = "Supplies",
    security(("bearerAuth" = []))
)]
pub async fn mark_supplies_picked_up(
    State(pool): State<PgPool>,
    Extension(actor): Extension<ActorContext>,
    Extension(view_cache): Extension<RequestViewCache>,
    Extension(events): Extension<EventSender>,
    Path(request_id): Path<i32>,
) -> Result<ApiResponse<serde_json::Value>, ApiResponse<()>> {
    require_any_role(&actor, &[Role::OperationsManager], DepartmentScope::Any)?;

    let request = get_request_by_id(&pool, request_id).await?;
    require_supply(&request)?;

    let mut tx = pool.begin().await.map_err(WorkflowError::from)?;
    let mut supply = sqlx::query_as::<_, SupplyRequest>(
        "SELECT request_id, date_and_time_needed, picked_up_at \
         FROM supply_requests WHERE request_id = $1 FOR UPDATE",
    )
    .bind(request_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(WorkflowError::from)?
    .ok_or_else(|| WorkflowError::not_found(format!("No supply request for request {request_id}")))?;

    let now = Utc::now().naive_utc();
    supply.mark_picked_up(now)?;

    sqlx::query("UPDATE supply_requests SET picked_up_at = $1 WHERE request_id = $2")
        .bind(now)
        .bind(request_id)
        .execute(&mut *tx)
        .await
        .map_err(WorkflowError::from)?;

    // deduct stock line by line; a line the store cannot cover aborts the
    // whole pickup
    let lines = sqlx::query(
        "SELECT supply_item_id, quantity FROM supply_request_items WHERE request_id = $1",
    )
    .bind(request_id)
    .fetch_all(&mut *tx)
    .await
    .map_err(WorkflowError::from)?;
    for line in &lines {
        let supply_item_id: i32 = line.get("supply_item_id");
        let quantity: i32 = line.get("quantity");
        let result = sqlx::query(
            "UPDATE supply_items SET quantity_on_hand = quantity_on_hand - $1 \
             WHERE id = $2 AND quantity_on_hand >= $1",
        )
        .bind(quantity)
        .bind(supply_item_id)
        .execute(&mut *tx)
        .await
        .map_err(WorkflowError::from)?;
        if result.rows_affected() == 0 {
            return Err(WorkflowError::validation(format!(
                "Not enough stock of supply item {supply_item_id}"
            ))
            .into());
        }
    }

    complete_envelope(&mut tx, &request, &actor).await?;
    tx.commit().await.map_err(WorkflowError::from)?;

    view_cache.invalidate(&request_id);
    events::publish(
        &events,
        events::REQUEST_UPDATE,
        request_id,
        request.request_type,
        RequestStatus::Completed,
    );

    if let Err(e) =
        notification::notify_request_decision(&pool, &request, RequestStatus::Completed, None).await
    {
        tracing::warn!("Failed to notify requester of request {request_id}: {e}");
    }

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Supplies picked up",
        json!({ "request_id": request_id, "picked_up_at": now }),
    ))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(mark_supplies_picked_up),
    components(schemas(SupplyRequest)),
    tags(
        (name = "Supplies", description = "Supply withdrawal pickup")
    )
)]
pub struct SupplyDoc;
