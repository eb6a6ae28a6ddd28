use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

use crate::close::state_machine::CloseStatus;

/// Error taxonomy for the close pipeline.
///
/// Every fallible operation in the crate surfaces one of these variants.
/// Only two failures are recovered locally (missing expenses data and
/// individual detail-row appends); everything else aborts the current
/// operation and must be retried in full by the caller.
#[derive(Debug, Error)]
pub enum AppError {
    /// Rejected before any write: missing identifiers, non-positive stay
    /// length, malformed dates or month numbers.
    #[error("{0}")]
    Validation(String),

    /// A required record is absent (ledger year/month row, unknown
    /// property, unknown booking). The operation aborts with no partial
    /// writes.
    #[error("{0}")]
    NotFound(String),

    /// The month-end status does not permit the requested operation. The
    /// current status is echoed back to the caller.
    #[error("{message}")]
    Precondition {
        message: String,
        current: CloseStatus,
    },

    /// A reservation-feed or ledger call failed. Surfaced verbatim, never
    /// retried here.
    #[error("upstream call failed: {0}")]
    Upstream(String),

    /// Request rejected before reaching the pipeline.
    #[error("unauthorized")]
    Auth,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    /// Shorthand for a precondition failure that echoes the current status.
    pub fn precondition(message: impl Into<String>, current: CloseStatus) -> Self {
        AppError::Precondition {
            message: message.into(),
            current,
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Upstream(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::Precondition { message, current } => (
                StatusCode::CONFLICT,
                json!({ "error": message, "current_status": current }),
            ),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, json!({ "error": msg })),
            AppError::Auth => (StatusCode::UNAUTHORIZED, json!({ "error": "unauthorized" })),
            AppError::Database(err) => {
                tracing::error!("database error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
