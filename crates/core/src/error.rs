//! Domain-level error type shared by every crate in the workspace.

use crate::types::DbId;

/// Errors raised by domain logic independent of transport or storage.
///
/// The API layer maps each variant onto an HTTP status; see `AppError`.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// Request input failed a domain rule (password length, blank field, ...).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A uniqueness rule would be broken (email or user name already taken).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The caller could not be authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The caller is authenticated but lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
