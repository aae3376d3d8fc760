// src/api/notification.rs
use axum::{routing::get, Router};
use sqlx::PgPool;

use crate::db::queries::notification::get_my_notifications;

pub fn notification_routes() -> Router<PgPool> {
    Router::new().route("/notifications", get(get_my_notifications))
}
