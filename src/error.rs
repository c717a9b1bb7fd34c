use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::validate::FieldErrors;

/// ApiError
///
/// The workflow error taxonomy. Every failure a handler can produce maps to
/// one of these variants, and every variant renders the stable error envelope
/// `{status: "error", message, errors? | error?}` with its HTTP status code.
///
/// Internal detail is logged, never returned: the `Internal` variant carries a
/// caller-safe message for the body and keeps the diagnostic string for the
/// tracing output only.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Field-level validation report; always enumerates every failing field.
    #[error("Validation failed")]
    Validation(FieldErrors),

    /// Generic credential rejection: no hint about which field was wrong,
    /// and no hint about whether the email exists.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Missing, malformed, unknown or revoked bearer token.
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Authenticated but lacking the required role.
    #[error("Forbidden")]
    Forbidden,

    /// Role-scoped lookup miss, e.g. an id that exists but isn't a farmer.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Unexpected storage or infrastructure failure. `message` is what the
    /// caller sees; `detail` goes to the log.
    #[error("{message}")]
    Internal { message: &'static str, detail: String },
}

impl ApiError {
    /// Wraps an unexpected failure with a caller-safe message.
    pub fn internal(message: &'static str, detail: impl std::fmt::Display) -> Self {
        ApiError::Internal {
            message,
            detail: detail.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "status": "error",
                    "message": "Validation failed",
                    "errors": errors,
                }),
            ),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                json!({
                    "status": "error",
                    "message": "Invalid credentials",
                    "error": "The provided credentials are incorrect.",
                }),
            ),
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                json!({
                    "status": "error",
                    "message": "Unauthenticated",
                }),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                json!({
                    "status": "error",
                    "message": "Forbidden",
                }),
            ),
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                json!({
                    "status": "error",
                    "message": format!("{what} not found"),
                }),
            ),
            ApiError::Internal { message, detail } => {
                // Full diagnostic detail stays in the log.
                tracing::error!("{message}: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "status": "error",
                        "message": message,
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
