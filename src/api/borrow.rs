use axum::{routing::post, Router};
use sqlx::PgPool;

use crate::db::queries::borrow::{pickup_item, return_item};

pub fn borrow_routes() -> Router<PgPool> {
    Router::new()
        .route("/requests/{request_id}/borrow/pickup", post(pickup_item))
        .route("/requests/{request_id}/borrow/return", post(return_item))
}
