//! Persistence seam for the session engine.
//!
//! [`SessionStore`] is deliberately narrow: row-level reads and writes plus
//! the one conditional update ([`SessionStore::rotate`]) that makes rotation
//! linearizable. [`PgSessionStore`] backs it with PostgreSQL through
//! `orbit_db`; [`memory::MemorySessionStore`] keeps everything in process.
//!
//! Errors are `sqlx::Error` in both implementations and always mean the store
//! could not answer, never that a credential is bad.

pub mod memory;

use async_trait::async_trait;
use orbit_core::types::{DbId, Timestamp};
use orbit_db::models::session::{CreateSession, RotateSession, SupersededRotation, UserSession};
use orbit_db::repositories::{SessionRepo, UserRepo};
use orbit_db::DbPool;
use uuid::Uuid;

use super::session::SessionUser;

pub use memory::MemorySessionStore;

/// Durable table of sessions keyed by rotation id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, input: CreateSession) -> Result<UserSession, sqlx::Error>;

    /// Current row for a rotation id, whatever its revoked/expiry state.
    async fn find_by_rotation_id(
        &self,
        rotation_id: Uuid,
    ) -> Result<Option<UserSession>, sqlx::Error>;

    /// Retained record of a rotation id that has been rotated away.
    async fn find_superseded(
        &self,
        rotation_id: Uuid,
    ) -> Result<Option<SupersededRotation>, sqlx::Error>;

    /// Replace the session's rotation only if it still carries
    /// `expected_rotation_id` and is not revoked; retain the replaced id.
    ///
    /// `Ok(None)` means the compare-and-swap lost and nothing was written.
    async fn rotate(
        &self,
        session_id: DbId,
        expected_rotation_id: Uuid,
        next: RotateSession,
    ) -> Result<Option<UserSession>, sqlx::Error>;

    /// Mark one session revoked. `false` if it was unknown or already revoked.
    async fn revoke(&self, rotation_id: Uuid) -> Result<bool, sqlx::Error>;

    /// Mark every session of a user revoked, returning how many flipped.
    async fn revoke_all_for_user(&self, user_id: DbId) -> Result<u64, sqlx::Error>;

    async fn list_active_for_user(&self, user_id: DbId) -> Result<Vec<UserSession>, sqlx::Error>;

    /// Drop expired sessions and lapsed superseded ids. Revoked sessions stay
    /// until they expire.
    async fn purge_expired(&self, now: Timestamp) -> Result<u64, sqlx::Error>;
}

/// Read-only view of users needed to mint access tokens at refresh time.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// `None` when the user no longer exists (or was soft-deleted).
    async fn find_session_user(&self, user_id: DbId) -> Result<Option<SessionUser>, sqlx::Error>;
}

/// PostgreSQL-backed store.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: DbPool,
}

impl PgSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, input: CreateSession) -> Result<UserSession, sqlx::Error> {
        SessionRepo::create(&self.pool, &input).await
    }

    async fn find_by_rotation_id(
        &self,
        rotation_id: Uuid,
    ) -> Result<Option<UserSession>, sqlx::Error> {
        SessionRepo::find_by_rotation_id(&self.pool, rotation_id).await
    }

    async fn find_superseded(
        &self,
        rotation_id: Uuid,
    ) -> Result<Option<SupersededRotation>, sqlx::Error> {
        SessionRepo::find_superseded(&self.pool, rotation_id).await
    }

    async fn rotate(
        &self,
        session_id: DbId,
        expected_rotation_id: Uuid,
        next: RotateSession,
    ) -> Result<Option<UserSession>, sqlx::Error> {
        SessionRepo::rotate(&self.pool, session_id, expected_rotation_id, &next).await
    }

    async fn revoke(&self, rotation_id: Uuid) -> Result<bool, sqlx::Error> {
        SessionRepo::revoke_by_rotation_id(&self.pool, rotation_id).await
    }

    async fn revoke_all_for_user(&self, user_id: DbId) -> Result<u64, sqlx::Error> {
        SessionRepo::revoke_all_for_user(&self.pool, user_id).await
    }

    async fn list_active_for_user(&self, user_id: DbId) -> Result<Vec<UserSession>, sqlx::Error> {
        SessionRepo::list_active_for_user(&self.pool, user_id).await
    }

    async fn purge_expired(&self, now: Timestamp) -> Result<u64, sqlx::Error> {
        SessionRepo::cleanup_expired(&self.pool, now).await
    }
}

#[async_trait]
impl UserDirectory for PgSessionStore {
    async fn find_session_user(&self, user_id: DbId) -> Result<Option<SessionUser>, sqlx::Error> {
        let Some(user) = UserRepo::find_by_id(&self.pool, user_id).await? else {
            return Ok(None);
        };
        match user.role() {
            Ok(role) => Ok(Some(SessionUser { user_id, role })),
            Err(err) => {
                tracing::error!(user_id, error = %err, "User has an unrecognised role");
                Ok(None)
            }
        }
    }
}
