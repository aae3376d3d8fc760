use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use moka::sync::Cache;
use serde::Deserialize;
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use utoipa::IntoParams;

use crate::db::models::borrow::{ReturnableRequest, ReturnableRequestView};
use crate::db::models::job::{JobRequest, JobRequestView, ReworkAttempt};
use crate::db::models::request::{
    NewRequest, Request, RequestPayload, RequestStatus, RequestType, RequestWithDetail,
    ScheduleUpdate, SpecializationView, StatusUpdate,
};
use crate::db::models::resource::ResourceKind;
use crate::db::models::supply::{SupplyLine, SupplyRequest, SupplyRequestView};
use crate::db::models::transport::TransportRequest;
use crate::db::models::venue::VenueRequest;
use crate::db::queries::reservation::ensure_window_free;
use crate::middleware::auth::ActorContext;
use crate::utils::api_response::ApiResponse;
use crate::utils::events::{self, EventSender};
use crate::utils::notification;
use crate::workflow::error::{WorkflowError, WorkflowResult};
use crate::workflow::policy::policy_for;
use crate::workflow::reservation::Window;
use crate::workflow::state::{plan_transition, ProgressSnapshot, ReasonField, TransitionPlan};

/// ✅ **Request view cache using `moka`** — invalidated on every mutation,
/// short TTL so read-time flags (overdue) never go far stale.
pub type RequestViewCache = Arc<Cache<i32, RequestWithDetail>>;

pub fn create_request_view_cache() -> RequestViewCache {
    Arc::new(
        Cache::builder()
            .time_to_live(Duration::from_secs(60))
            .build(),
    )
}

const REQUEST_COLUMNS: &str = "id, request_type, status, requested_by, department_id, reviewed_by, \
     rejection_reason, cancellation_reason, on_hold_reason, created_at, completed_at";

pub async fn get_request_by_id(pool: &PgPool, request_id: i32) -> WorkflowResult<Request> {
    sqlx::query_as::<_, Request>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM requests WHERE id = $1"
    ))
    .bind(request_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| WorkflowError::not_found(format!("No request with id {request_id}")))
}

fn missing_detail(request_id: i32) -> WorkflowError {
    WorkflowError::not_found(format!(
        "Request {request_id} has no specialization record"
    ))
}

/// The slice of the specialization the state machine needs for its guards.
pub async fn fetch_snapshot(pool: &PgPool, request: &Request) -> WorkflowResult<ProgressSnapshot> {
    let snapshot = match request.request_type {
        RequestType::Job => {
            let row: Option<(Option<i32>, crate::db::models::job::JobStatus)> = sqlx::query_as(
                "SELECT assigned_to, status FROM job_requests WHERE request_id = $1",
            )
            .bind(request.id)
            .fetch_optional(pool)
            .await?;
            let (assigned_to, status) = row.ok_or_else(|| missing_detail(request.id))?;
            ProgressSnapshot {
                in_progress: false,
                job_status: Some(status),
                personnel_assigned: assigned_to.is_some(),
                head_approval: None,
            }
        }
        RequestType::Venue => {
            let row: Option<(bool, Option<bool>)> = sqlx::query_as(
                "SELECT in_progress, approved_by_head FROM venue_requests WHERE request_id = $1",
            )
            .bind(request.id)
            .fetch_optional(pool)
            .await?;
            let (in_progress, head_approval) = row.ok_or_else(|| missing_detail(request.id))?;
            ProgressSnapshot {
                in_progress,
                head_approval,
                ..Default::default()
            }
        }
        RequestType::Transport => {
            let row: Option<(bool,)> = sqlx::query_as(
                "SELECT in_progress FROM transport_requests WHERE request_id = $1",
            )
            .bind(request.id)
            .fetch_optional(pool)
            .await?;
            let (in_progress,) = row.ok_or_else(|| missing_detail(request.id))?;
            ProgressSnapshot {
                in_progress,
                ..Default::default()
            }
        }
        RequestType::Borrow => {
            let row: Option<(bool,)> = sqlx::query_as(
                "SELECT in_progress FROM returnable_requests WHERE request_id = $1",
            )
            .bind(request.id)
            .fetch_optional(pool)
            .await?;
            let (in_progress,) = row.ok_or_else(|| missing_detail(request.id))?;
            ProgressSnapshot {
                in_progress,
                ..Default::default()
            }
        }
        RequestType::Supply => ProgressSnapshot::default(),
    };
    Ok(snapshot)
}

/// Join the type-specific detail onto the envelope for reads.
pub async fn fetch_detail(pool: &PgPool, request: &Request) -> WorkflowResult<SpecializationView> {
    let view = match request.request_type {
        RequestType::Job => {
            let job = sqlx::query_as::<_, JobRequest>(
                "SELECT request_id, job_type, location, description, assigned_to, status, \
                 verified_by_requester, verified_by_reviewer FROM job_requests WHERE request_id = $1",
            )
            .bind(request.id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| missing_detail(request.id))?;

            let rework_attempts = sqlx::query_as::<_, ReworkAttempt>(
                "SELECT id, job_request_id, rejection_reason, rework_start_date, rework_end_date, \
                 resolved, created_at FROM rework_attempts WHERE job_request_id = $1 \
                 ORDER BY created_at, id",
            )
            .bind(request.id)
            .fetch_all(pool)
            .await?;

            SpecializationView::Job(JobRequestView {
                job,
                rework_attempts,
            })
        }
        RequestType::Venue => {
            let venue = sqlx::query_as::<_, VenueRequest>(
                "SELECT request_id, venue_id, start_time, end_time, approved_by_head, in_progress, \
                 actual_start, actual_end_time, setup_requirements FROM venue_requests WHERE request_id = $1",
            )
            .bind(request.id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| missing_detail(request.id))?;
            SpecializationView::Venue(venue)
        }
        RequestType::Transport => {
            let transport = sqlx::query_as::<_, TransportRequest>(
                "SELECT request_id, vehicle_id, date_and_time_needed, estimated_end_time, destination, \
                 in_progress, actual_start, odometer_start, odometer_end, total_distance_travelled \
                 FROM transport_requests WHERE request_id = $1",
            )
            .bind(request.id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| missing_detail(request.id))?;
            SpecializationView::Transport(transport)
        }
        RequestType::Borrow => {
            let loan = sqlx::query_as::<_, ReturnableRequest>(
                "SELECT request_id, item_id, date_and_time_needed, return_date_and_time, in_progress, \
                 is_returned, actual_return_date, return_condition, is_lost, lost_reason \
                 FROM returnable_requests WHERE request_id = $1",
            )
            .bind(request.id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| missing_detail(request.id))?;
            let is_overdue = loan.is_overdue_at(Utc::now().naive_utc());
            SpecializationView::Borrow(ReturnableRequestView { loan, is_overdue })
        }
        RequestType::Supply => {
            let supply = sqlx::query_as::<_, SupplyRequest>(
                "SELECT request_id, date_and_time_needed, picked_up_at FROM supply_requests WHERE request_id = $1",
            )
            .bind(request.id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| missing_detail(request.id))?;
            let items = sqlx::query_as::<_, SupplyLine>(
                "SELECT id, request_id, supply_item_id, quantity FROM supply_request_items WHERE request_id = $1 ORDER BY id",
            )
            .bind(request.id)
            .fetch_all(pool)
            .await?;
            SpecializationView::Supply(SupplyRequestView { supply, items })
        }
    };
    Ok(view)
}

/// Persist a planned transition with a compare-and-set on the `from`
/// status, so a stale read can never drive a transition.
pub async fn apply_transition_plan(
    tx: &mut Transaction<'_, Postgres>,
    request_id: i32,
    plan: &TransitionPlan,
    actor_id: i32,
) -> WorkflowResult<()> {
    let mut qb = QueryBuilder::<Postgres>::new("UPDATE requests SET status = ");
    qb.push_bind(plan.to);
    if plan.set_reviewer {
        qb.push(", reviewed_by = COALESCE(reviewed_by, ");
        qb.push_bind(actor_id);
        qb.push(")");
    }
    if let Some((field, text)) = &plan.reason {
        let column = match field {
            ReasonField::Rejection => "rejection_reason",
            ReasonField::Cancellation => "cancellation_reason",
            ReasonField::OnHold => "on_hold_reason",
        };
        qb.push(format!(", {column} = "));
        qb.push_bind(text);
    }
    if plan.clear_on_hold_reason {
        qb.push(", on_hold_reason = NULL");
    }
    if plan.stamp_completed_at {
        qb.push(", completed_at = NOW()");
    }
    qb.push(" WHERE id = ");
    qb.push_bind(request_id);
    qb.push(" AND status = ");
    qb.push_bind(plan.from);

    let result = qb.build().execute(&mut **tx).await?;
    if result.rows_affected() == 0 {
        return Err(WorkflowError::conflict(
            "The request was modified concurrently; please reload and retry",
        ));
    }
    Ok(())
}

/// Close the envelope of an approved request after its type's completion
/// predicate held; shared by the per-type completion actions.
pub async fn complete_envelope(
    tx: &mut Transaction<'_, Postgres>,
    request: &Request,
    actor: &ActorContext,
) -> WorkflowResult<()> {
    let plan =
        crate::workflow::state::plan_completion(request, actor, policy_for(request.request_type))?;
    apply_transition_plan(tx, request.id, &plan, actor.user_id).await
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
    path = "/requests",
    request_body = NewRequest,
    responses(
        (status = 201, description = "Request created", body = Request),
        (status = 409, description = "Resource already reserved for an overlapping window"),
        (status = 422, description = "Malformed payload")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn create_request(
    State(pool): State<PgPool>,
    Extension(actor): Extension<ActorContext>,
    Extension(events): Extension<EventSender>,
    Json(payload): Json<NewRequest>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    let department_id = payload
        .department_id
        .or(actor.department_id)
        .ok_or_else(|| WorkflowError::validation("The request needs a department"))?;

    validate_payload(&payload.payload)?;
    let request_type = payload.payload.request_type();

    let mut tx = pool.begin().await.map_err(WorkflowError::from)?;

    // interval-bound types: lock the resource and check for overlaps
    // inside the same transaction as the insert
    let mut venue_to_notify: Option<(i32, String)> = None;
    match &payload.payload {
        RequestPayload::Venue(venue) => {
            let window = Window::new(venue.start_time, venue.end_time)?;
            ensure_window_free(&mut tx, ResourceKind::Venue, venue.venue_id, &window, None).await?;
            let row: Option<(String, i32)> =
                sqlx::query_as("SELECT name, department_id FROM venues WHERE id = $1")
                    .bind(venue.venue_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(WorkflowError::from)?;
            if let Some((name, owning_department)) = row {
                venue_to_notify = Some((owning_department, name));
            }
        }
        RequestPayload::Transport(transport) => {
            let window = Window::new(transport.date_and_time_needed, transport.estimated_end_time)?;
            ensure_window_free(
                &mut tx,
                ResourceKind::Vehicle,
                transport.vehicle_id,
                &window,
                None,
            )
            .await?;
        }
        RequestPayload::Borrow(borrow) => {
            let window = Window::new(borrow.date_and_time_needed, borrow.return_date_and_time)?;
            ensure_window_free(&mut tx, ResourceKind::Item, borrow.item_id, &window, None).await?;
        }
        RequestPayload::Job(_) | RequestPayload::Supply(_) => {}
    }

    let request = sqlx::query_as::<_, Request>(&format!(
        "INSERT INTO requests (request_type, requested_by, department_id) \
         VALUES ($1, $2, $3) RETURNING {REQUEST_COLUMNS}"
    ))
    .bind(request_type)
    .bind(actor.user_id)
    .bind(department_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(WorkflowError::from)?;

    insert_specialization(&mut tx, request.id, &payload.payload).await?;

    tx.commit().await.map_err(WorkflowError::from)?;

    events::publish(
        &events,
        events::REQUEST_CREATED,
        request.id,
        request_type,
        request.status,
    );

    // fire-and-forget notifications; a failed publish never fails the create
    if let Err(e) = notification::notify_request_submitted(&pool, &request, &actor.username).await {
        tracing::warn!("Failed to notify reviewers of request {}: {e}", request.id);
    }
    if let Some((owning_department, venue_name)) = venue_to_notify {
        if let Err(e) =
            notification::notify_head_approval_needed(&pool, &request, owning_department, &venue_name)
                .await
        {
            tracing::warn!("Failed to notify department head for request {}: {e}", request.id);
        }
    }

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Request created",
        request,
    ))
}

fn validate_payload(payload: &RequestPayload) -> WorkflowResult<()> {
    match payload {
        RequestPayload::Job(job) => {
            if job.job_type.trim().is_empty()
                || job.location.trim().is_empty()
                || job.description.trim().is_empty()
            {
                return Err(WorkflowError::validation(
                    "Job type, location and description are all required",
                ));
            }
        }
        RequestPayload::Venue(_) | RequestPayload::Borrow(_) => {}
        RequestPayload::Transport(transport) => {
            if transport.destination.trim().is_empty() {
                return Err(WorkflowError::validation("A destination is required"));
            }
        }
        RequestPayload::Supply(supply) => {
            if supply.items.is_empty() {
                return Err(WorkflowError::validation(
                    "A supply request needs at least one line item",
                ));
            }
            if supply.items.iter().any(|line| line.quantity <= 0) {
                return Err(WorkflowError::validation(
                    "Supply quantities must be positive",
                ));
            }
        }
    }
    Ok(())
}

async fn insert_specialization(
    tx: &mut Transaction<'_, Postgres>,
    request_id: i32,
    payload: &RequestPayload,
) -> WorkflowResult<()> {
    match payload {
        RequestPayload::Job(job) => {
            sqlx::query(
                "INSERT INTO job_requests (request_id, job_type, location, description) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(request_id)
            .bind(job.job_type.trim())
            .bind(job.location.trim())
            .bind(job.description.trim())
            .execute(&mut **tx)
            .await?;
        }
        RequestPayload::Venue(venue) => {
            sqlx::query(
                "INSERT INTO venue_requests (request_id, venue_id, start_time, end_time, setup_requirements) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(request_id)
            .bind(venue.venue_id)
            .bind(venue.start_time)
            .bind(venue.end_time)
            .bind(&venue.setup_requirements)
            .execute(&mut **tx)
            .await?;
        }
        RequestPayload::Transport(transport) => {
            sqlx::query(
                "INSERT INTO transport_requests (request_id, vehicle_id, date_and_time_needed, \
                 estimated_end_time, destination) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(request_id)
            .bind(transport.vehicle_id)
            .bind(transport.date_and_time_needed)
            .bind(transport.estimated_end_time)
            .bind(transport.destination.trim())
            .execute(&mut **tx)
            .await?;
        }
        RequestPayload::Borrow(borrow) => {
            sqlx::query(
                "INSERT INTO returnable_requests (request_id, item_id, date_and_time_needed, \
                 return_date_and_time) VALUES ($1, $2, $3, $4)",
            )
            .bind(request_id)
            .bind(borrow.item_id)
            .bind(borrow.date_and_time_needed)
            .bind(borrow.return_date_and_time)
            .execute(&mut **tx)
            .await?;
        }
        RequestPayload::Supply(supply) => {
            sqlx::query(
                "INSERT INTO supply_requests (request_id, date_and_time_needed) VALUES ($1, $2)",
            )
            .bind(request_id)
            .bind(supply.date_and_time_needed)
            .execute(&mut **tx)
            .await?;
            for line in &supply.items {
                sqlx::query(
                    "INSERT INTO supply_request_items (request_id, supply_item_id, quantity) \
                     VALUES ($1, $2, $3)",
                )
                .bind(request_id)
                .bind(line.supply_item_id)
                .bind(line.quantity)
                .execute(&mut **tx)
                .await?;
            }
        }
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub request_type: Option<RequestType>,
    pub department_id: Option<i32>,
    pub requested_by: Option<i32>,
}

#[utoipa::path(
    get,
    path = "/requests",
    params(RequestFilter),
    responses(
        (status = 200, description = "List of requests", body = Vec<Request>)
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn list_requests(
    State(pool): State<PgPool>,
    Query(filter): Query<RequestFilter>,
) -> Result<ApiResponse<Vec<Request>>, ApiResponse<()>> {
    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {REQUEST_COLUMNS} FROM requests WHERE 1 = 1"
    ));
    if let Some(status) = filter.status {
        qb.push(" AND status = ");
        qb.push_bind(status);
    }
    if let Some(request_type) = filter.request_type {
        qb.push(" AND request_type = ");
        qb.push_bind(request_type);
    }
    if let Some(department_id) = filter.department_id {
        qb.push(" AND department_id = ");
        qb.push_bind(department_id);
    }
    if let Some(requested_by) = filter.requested_by {
        qb.push(" AND requested_by = ");
        qb.push_bind(requested_by);
    }
    qb.push(" ORDER BY created_at DESC");

    let requests = qb
        .build_query_as::<Request>()
        .fetch_all(&pool)
        .await
        .map_err(WorkflowError::from)?;

    Ok(ApiResponse::success(StatusCode::OK, "Requests", requests))
}

#[utoipa::path(
    get,
    path = "/requests/{request_id}",
    params(("request_id" = i32, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request with detail", body = RequestWithDetail),
        (status = 404, description = "Request not found")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn get_request(
    State(pool): State<PgPool>,
    Extension(view_cache): Extension<RequestViewCache>,
    Path(request_id): Path<i32>,
) -> Result<ApiResponse<RequestWithDetail>, ApiResponse<()>> {
    if let Some(cached) = view_cache.get(&request_id) {
        return Ok(ApiResponse::success(StatusCode::OK, "Request", cached));
    }

    let request = get_request_by_id(&pool, request_id).await?;
    let detail = fetch_detail(&pool, &request).await?;
    let view = RequestWithDetail { request, detail };
    view_cache.insert(request_id, view.clone());

    Ok(ApiResponse::success(StatusCode::OK, "Request", view))
}

#[utoipa::path(
    patch,
    path = "/requests/{request_id}/status",
    params(("request_id" = i32, Path, description = "Request ID")),
    request_body = StatusUpdate,
    responses(
        (status = 200, description = "Status updated"),
        (status = 400, description = "Transition not legal from the current status"),
        (status = 403, description = "Actor lacks the required role"),
        (status = 404, description = "Request not found"),
        (status = 422, description = "Required reason missing")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn update_request_status(
    State(pool): State<PgPool>,
    Extension(actor): Extension<ActorContext>,
    Extension(view_cache): Extension<RequestViewCache>,
    Extension(events): Extension<EventSender>,
    Path(request_id): Path<i32>,
    Json(update): Json<StatusUpdate>,
) -> Result<ApiResponse<serde_json::Value>, ApiResponse<()>> {
    let request = get_request_by_id(&pool, request_id).await?;
    let snapshot = fetch_snapshot(&pool, &request).await?;
    let policy = policy_for(request.request_type);

    let plan = plan_transition(
        &request,
        &snapshot,
        &actor,
        policy,
        update.target,
        update.reason.as_deref(),
    )?;

    let mut tx = pool.begin().await.map_err(WorkflowError::from)?;
    apply_transition_plan(&mut tx, request_id, &plan, actor.user_id).await?;
    tx.commit().await.map_err(WorkflowError::from)?;

    view_cache.invalidate(&request_id);
    publish_update(&events, &request, plan.to);

    let reason_text = plan.reason.as_ref().map(|(_, text)| text.as_str());
    if let Err(e) =
        notification::notify_request_decision(&pool, &request, plan.to, reason_text).await
    {
        tracing::warn!("Failed to notify requester of request {request_id}: {e}");
    }

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Status updated",
        json!({ "request_id": request_id, "status": plan.to }),
    ))
}

#[utoipa::path(
    patch,
    path = "/requests/{request_id}/schedule",
    params(("request_id" = i32, Path, description = "Request ID")),
    request_body = ScheduleUpdate,
    responses(
        (status = 200, description = "Reservation window moved"),
        (status = 409, description = "New window overlaps an active reservation"),
        (status = 422, description = "Request type has no reservation window or is past editing")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn update_schedule(
    State(pool): State<PgPool>,
    Extension(actor): Extension<ActorContext>,
    Extension(view_cache): Extension<RequestViewCache>,
    Extension(events): Extension<EventSender>,
    Path(request_id): Path<i32>,
    Json(update): Json<ScheduleUpdate>,
) -> Result<ApiResponse<serde_json::Value>, ApiResponse<()>> {
    let request = get_request_by_id(&pool, request_id).await?;

    if request.requested_by != actor.user_id && !actor.is_admin() {
        return Err(WorkflowError::forbidden(
            "Only the original requester may reschedule this request",
        )
        .into());
    }
    if !matches!(
        request.status,
        RequestStatus::Pending | RequestStatus::OnHold
    ) {
        return Err(WorkflowError::validation(
            "Only pending or on-hold requests can be rescheduled",
        )
        .into());
    }

    let window = Window::new(update.start, update.end)?;

    let mut tx = pool.begin().await.map_err(WorkflowError::from)?;

    let (kind, resource_id, sql) = match request.request_type {
        RequestType::Venue => {
            let (venue_id,): (i32,) =
                sqlx::query_as("SELECT venue_id FROM venue_requests WHERE request_id = $1")
                    .bind(request_id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(WorkflowError::from)?;
            (
                ResourceKind::Venue,
                venue_id,
                "UPDATE venue_requests SET start_time = $1, end_time = $2 WHERE request_id = $3",
            )
        }
        RequestType::Transport => {
            let (vehicle_id,): (i32,) =
                sqlx::query_as("SELECT vehicle_id FROM transport_requests WHERE request_id = $1")
                    .bind(request_id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(WorkflowError::from)?;
            (
                ResourceKind::Vehicle,
                vehicle_id,
                "UPDATE transport_requests SET date_and_time_needed = $1, estimated_end_time = $2 \
                 WHERE request_id = $3",
            )
        }
        RequestType::Borrow => {
            let (item_id,): (i32,) =
                sqlx::query_as("SELECT item_id FROM returnable_requests WHERE request_id = $1")
                    .bind(request_id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(WorkflowError::from)?;
            (
                ResourceKind::Item,
                item_id,
                "UPDATE returnable_requests SET date_and_time_needed = $1, return_date_and_time = $2 \
                 WHERE request_id = $3",
            )
        }
        RequestType::Job | RequestType::Supply => {
            return Err(WorkflowError::validation(
                "This request type has no reservation window",
            )
            .into());
        }
    };

    // the edit excludes the request's own reservation from the overlap set
    ensure_window_free(&mut tx, kind, resource_id, &window, Some(request_id)).await?;

    sqlx::query(sql)
        .bind(window.start)
        .bind(window.end)
        .bind(request_id)
        .execute(&mut *tx)
        .await
        .map_err(WorkflowError::from)?;

    tx.commit().await.map_err(WorkflowError::from)?;

    view_cache.invalidate(&request_id);
    publish_update(&events, &request, request.status);

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Reservation window moved",
        json!({ "request_id": request_id }),
    ))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(
        create_request,
        list_requests,
        get_request,
        update_request_status,
        update_schedule,
        crate::db::queries::reservation::check_availability
    ),
    components(schemas(
        Request,
        NewRequest,
        RequestWithDetail,
        StatusUpdate,
        ScheduleUpdate,
        RequestStatus,
        RequestType
    )),
    tags(
        (name = "Requests", description = "Endpoints for managing resource requests")
    )
)]
pub struct RequestDoc;
