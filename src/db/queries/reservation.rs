use axum::{
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use utoipa::IntoParams;

use crate::db::models::resource::ResourceKind;
use crate::utils::api_response::ApiResponse;
use crate::workflow::error::{WorkflowError, WorkflowResult};
use crate::workflow::reservation::Window;

/// Table/column mapping for each interval-bound specialization. Every
/// reservation read or write goes through this module; no other code path
/// touches the interval columns.
struct ReservationSource {
    master_table: &'static str,
    table: &'static str,
    resource_col: &'static str,
    start_col: &'static str,
    end_col: &'static str,
    noun: &'static str,
}

fn source_for(kind: ResourceKind) -> ReservationSource {
    match kind {
        ResourceKind::Venue => ReservationSource {
            master_table: "venues",
            table: "venue_requests",
            resource_col: "venue_id",
            start_col: "start_time",
            end_col: "end_time",
            noun: "venue",
        },
        ResourceKind::Vehicle => ReservationSource {
            master_table: "vehicles",
            table: "transport_requests",
            resource_col: "vehicle_id",
            start_col: "date_and_time_needed",
            end_col: "estimated_end_time",
            noun: "vehicle",
        },
        ResourceKind::Item => ReservationSource {
            master_table: "borrowable_items",
            table: "returnable_requests",
            resource_col: "item_id",
            start_col: "date_and_time_needed",
            end_col: "return_date_and_time",
            noun: "item",
        },
    }
}

/// Row-lock the resource master so concurrent submissions for the same
/// resource serialize before the overlap check.
pub async fn lock_resource(
    tx: &mut Transaction<'_, Postgres>,
    kind: ResourceKind,
    resource_id: i32,
) -> WorkflowResult<()> {
    let source = source_for(kind);
    let sql = format!(
        "SELECT id FROM {} WHERE id = $1 FOR UPDATE",
        source.master_table
    );
    let row: Option<(i32,)> = sqlx::query_as(&sql)
        .bind(resource_id)
        .fetch_optional(&mut **tx)
        .await?;
    if row.is_none() {
        return Err(WorkflowError::not_found(format!(
            "No {} with id {resource_id}",
            source.noun
        )));
    }
    Ok(())
}

/// Half-open overlap against all active reservations of the resource.
/// Active means the owning request is pending, reviewed or approved; an
/// on-hold request releases its slot.
pub async fn conflict_exists(
    tx: &mut Transaction<'_, Postgres>,
    kind: ResourceKind,
    resource_id: i32,
    window: &Window,
    exclude_request_id: Option<i32>,
) -> Result<bool, sqlx::Error> {
    let source = source_for(kind);
    let sql = format!(
        r#"
        SELECT EXISTS (
            SELECT 1
            FROM {table} s
            JOIN requests r ON r.id = s.request_id
            WHERE s.{resource_col} = $1
              AND r.status IN ('pending', 'reviewed', 'approved')
              AND s.{start_col} < $3 AND $2 < s.{end_col}
              AND ($4::int4 IS NULL OR s.request_id <> $4)
        )
        "#,
        table = source.table,
        resource_col = source.resource_col,
        start_col = source.start_col,
        end_col = source.end_col,
    );
    sqlx::query_scalar(&sql)
        .bind(resource_id)
        .bind(window.start)
        .bind(window.end)
        .bind(exclude_request_id)
        .fetch_one(&mut **tx)
        .await
}

/// Lock the resource, then fail with `ConflictError` if the window
/// overlaps any active reservation. Must run inside the same transaction
/// as the write that creates or moves the interval.
pub async fn ensure_window_free(
    tx: &mut Transaction<'_, Postgres>,
    kind: ResourceKind,
    resource_id: i32,
    window: &Window,
    exclude_request_id: Option<i32>,
) -> WorkflowResult<()> {
    lock_resource(tx, kind, resource_id).await?;
    if conflict_exists(tx, kind, resource_id, window, exclude_request_id).await? {
        let source = source_for(kind);
        return Err(WorkflowError::conflict(format!(
            "The {} is already reserved for an overlapping time window",
            source.noun
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AvailabilityQuery {
    pub resource_type: ResourceKind,
    pub resource_id: i32,
    pub start: chrono::NaiveDateTime,
    pub end: chrono::NaiveDateTime,
    pub exclude_request_id: Option<i32>,
}

#[utoipa::path(
    get,
    path = "/availability",
    params(AvailabilityQuery),
    responses(
        (status = 200, description = "Availability of the resource for the window"),
        (status = 422, description = "Invalid window")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn check_availability(
    State(pool): State<PgPool>,
    Query(params): Query<AvailabilityQuery>,
) -> Result<ApiResponse<serde_json::Value>, ApiResponse<()>> {
    let window = Window::new(params.start, params.end)?;

    // advisory read: no lock, the authoritative check happens at write time
    let mut tx = pool.begin().await.map_err(WorkflowError::from)?;
    let conflict = conflict_exists(
        &mut tx,
        params.resource_type,
        params.resource_id,
        &window,
        params.exclude_request_id,
    )
    .await
    .map_err(WorkflowError::from)?;
    tx.commit().await.map_err(WorkflowError::from)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Availability checked",
        json!({ "available": !conflict }),
    ))
}
