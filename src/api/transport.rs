use axum::{routing::post, Router};
use sqlx::PgPool;

use crate::db::queries::transport::{complete_transport_request, start_transport_request};

pub fn transport_routes() -> Router<PgPool> {
    Router::new()
        .route(
            "/requests/{request_id}/transport/start",
            post(start_transport_request),
        )
        .route(
            "/requests/{request_id}/transport/complete",
            post(complete_transport_request),
        )
}
