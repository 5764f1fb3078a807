use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use orbit_core::error::CoreError;
use serde_json::json;

use crate::auth::session::SessionError;

/// Message shared by every authentication rejection, so a client cannot tell
/// an unknown credential from a revoked, expired, or replayed one.
const UNAUTHORIZED_MESSAGE: &str = "Invalid or expired credentials";

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`SessionError`] for the session
/// engine, and adds HTTP-specific variants. Implements [`IntoResponse`] to
/// produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `orbit_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A failure reported by the session engine.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal()
                }
            },

            // --- Session engine ---
            AppError::Session(err) => classify_session_error(err),

            // --- Database errors ---
            AppError::Database(err) => classify_sqlx_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

/// Classify a session-engine error.
///
/// Authentication decisions collapse to one 401; a lost rotation race is a
/// retryable 409; store and hashing failures stay 5xx.
fn classify_session_error(err: &SessionError) -> (StatusCode, &'static str, String) {
    match err {
        SessionError::MalformedCredential(e) => (
            StatusCode::BAD_REQUEST,
            "MALFORMED_CREDENTIAL",
            e.to_string(),
        ),
        SessionError::InvalidCredential
        | SessionError::ExpiredOrRevoked
        | SessionError::ReuseDetected
        | SessionError::SessionRevokedOrExpired
        | SessionError::Signature(_) => (
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            UNAUTHORIZED_MESSAGE.to_string(),
        ),
        SessionError::ConcurrentRotationLost => (
            StatusCode::CONFLICT,
            "ROTATION_CONFLICT",
            "Session was refreshed concurrently; retry the request".to_string(),
        ),
        SessionError::Store(db_err) => classify_sqlx_error(db_err),
        SessionError::Hash(e) => {
            tracing::error!(error = %e, "Credential hashing failed");
            internal()
        }
        SessionError::Signing(e) => {
            tracing::error!(error = %e, "Access token signing failed");
            internal()
        }
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Pool timeouts and I/O failures map to 503; the caller may retry.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            tracing::error!(error = %err, "Session store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "STORE_UNAVAILABLE",
                "Service temporarily unavailable".to_string(),
            )
        }
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            internal()
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}
