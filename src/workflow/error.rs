use axum::http::StatusCode;
use serde_json::json;

use crate::utils::api_response::ApiResponse;

/// Result type for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Errors that can occur while driving a request through its lifecycle.
///
/// Every mutation surfaces one of these; the HTTP layer maps each variant to
/// a status code and a machine-readable `kind` so callers can distinguish a
/// double-booking from an illegal transition without parsing messages.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("transition from '{from}' to '{to}' is not allowed")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl WorkflowError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Machine-readable discriminator carried in the error payload.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Conflict(_) => "conflict_error",
            Self::InvalidTransition { .. } => "invalid_transition_error",
            Self::Forbidden(_) => "forbidden_error",
            Self::NotFound(_) => "not_found_error",
            Self::Database(_) => "database_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<WorkflowError> for ApiResponse<()> {
    fn from(err: WorkflowError) -> Self {
        ApiResponse::<()>::error(
            err.status_code(),
            err.to_string(),
            Some(json!({ "kind": err.kind() })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinguishable() {
        let errors = [
            WorkflowError::validation("missing reason"),
            WorkflowError::conflict("double booking"),
            WorkflowError::InvalidTransition {
                from: "pending",
                to: "completed",
            },
            WorkflowError::forbidden("wrong role"),
            WorkflowError::not_found("no such request"),
        ];
        let kinds: std::collections::HashSet<_> = errors.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn conflict_maps_to_409() {
        assert_eq!(
            WorkflowError::conflict("x").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            WorkflowError::forbidden("x").status_code(),
            StatusCode::FORBIDDEN
        );
    }
}
