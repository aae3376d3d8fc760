use axum::{routing::post, Router};
use sqlx::PgPool;

use crate::db::queries::supply::mark_supplies_picked_up;

pub fn supply_routes() -> Router<PgPool> {
    Router::new().route(
        "/requests/{request_id}/supply/pickup",
        post(mark_supplies_picked_up),
    )
}
