use axum::{
    routing::{get, patch, post},
    Router,
};
use sqlx::PgPool;

use crate::db::queries::request::{
    create_request, get_request, list_requests, update_request_status, update_schedule,
};
use crate::db::queries::reservation::check_availability;

pub fn request_routes() -> Router<PgPool> {
    Router::new()
        .route("/requests", post(create_request).get(list_requests))
        .route("/requests/{request_id}", get(get_request))
        .route(
            "/requests/{request_id}/status",
            patch(update_request_status),
        )
        .route("/requests/{request_id}/schedule", patch(update_schedule))
        .route("/availability", get(check_availability))
}
