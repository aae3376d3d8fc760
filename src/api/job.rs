use axum::{
    routing::{patch, post},
    Router,
};
use sqlx::PgPool;

use crate::db::queries::job::{
    assign_personnel, reject_job, update_job_status, update_rework, verify_job_completion,
};

pub fn job_routes() -> Router<PgPool> {
    Router::new()
        .route("/requests/{request_id}/assign", post(assign_personnel))
        .route("/requests/{request_id}/job-status", patch(update_job_status))
        .route("/requests/{request_id}/verify", post(verify_job_completion))
        .route("/requests/{request_id}/reject-job", post(reject_job))
        .route("/rework/{rework_id}", patch(update_rework))
}
