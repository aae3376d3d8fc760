use axum::{routing::post, Router};
use sqlx::PgPool;

use crate::db::queries::venue::{complete_venue_request, head_approval, start_venue_use};

pub fn venue_routes() -> Router<PgPool> {
    Router::new()
        .route("/requests/{request_id}/head-approval", post(head_approval))
        .route("/requests/{request_id}/venue/start", post(start_venue_use))
        .route(
            "/requests/{request_id}/venue/complete",
            post(complete_venue_request),
        )
}
