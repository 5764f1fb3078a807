//! Refresh session model and DTOs.

use orbit_core::types::{DbId, Timestamp};
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `user_sessions` table: one refresh lineage.
///
/// `id` never changes across rotations; `rotation_id`, `secret_hash`,
/// `issued_at`, `expires_at`, and the audit columns are replaced on every
/// successful refresh.
#[derive(Debug, Clone, FromRow)]
pub struct UserSession {
    pub id: DbId,
    pub user_id: DbId,
    pub rotation_id: Uuid,
    pub secret_hash: String,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
    pub is_revoked: bool,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl UserSession {
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }

    /// Revocation and expiry each invalidate a session on their own.
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        !self.is_revoked && !self.is_expired_at(now)
    }
}

/// DTO for inserting a new session at login.
#[derive(Debug, Clone)]
pub struct CreateSession {
    pub user_id: DbId,
    pub rotation_id: Uuid,
    pub secret_hash: String,
    pub expires_at: Timestamp,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// New values written by a successful rotation.
#[derive(Debug, Clone)]
pub struct RotateSession {
    pub rotation_id: Uuid,
    pub secret_hash: String,
    pub expires_at: Timestamp,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// A rotation id that was replaced, kept so a replay can be recognised.
#[derive(Debug, Clone, FromRow)]
pub struct SupersededRotation {
    pub rotation_id: Uuid,
    pub session_id: DbId,
    pub user_id: DbId,
    pub secret_hash: String,
    pub superseded_at: Timestamp,
    pub retain_until: Timestamp,
}
