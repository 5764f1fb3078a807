//! Repository for the `user_sessions` and `superseded_rotations` tables.

use orbit_core::types::{DbId, Timestamp};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::session::{CreateSession, RotateSession, SupersededRotation, UserSession};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, rotation_id, secret_hash, issued_at, expires_at, is_revoked, \
                        client_ip, user_agent, created_at, updated_at";

const SUPERSEDED_COLUMNS: &str =
    "rotation_id, session_id, user_id, secret_hash, superseded_at, retain_until";

/// Persistence for refresh lineages.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new session, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateSession) -> Result<UserSession, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_sessions
                (user_id, rotation_id, secret_hash, expires_at, client_ip, user_agent)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserSession>(&query)
            .bind(input.user_id)
            .bind(input.rotation_id)
            .bind(&input.secret_hash)
            .bind(input.expires_at)
            .bind(&input.client_ip)
            .bind(&input.user_agent)
            .fetch_one(pool)
            .await
    }

    /// Find a session by its current rotation id.
    ///
    /// Revoked and expired rows are returned too; callers decide validity.
    pub async fn find_by_rotation_id(
        pool: &PgPool,
        rotation_id: Uuid,
    ) -> Result<Option<UserSession>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM user_sessions WHERE rotation_id = $1");
        sqlx::query_as::<_, UserSession>(&query)
            .bind(rotation_id)
            .fetch_optional(pool)
            .await
    }

    /// Find a retained, already-rotated-away rotation id.
    pub async fn find_superseded(
        pool: &PgPool,
        rotation_id: Uuid,
    ) -> Result<Option<SupersededRotation>, sqlx::Error> {
        let query =
            format!("SELECT {SUPERSEDED_COLUMNS} FROM superseded_rotations WHERE rotation_id = $1");
        sqlx::query_as::<_, SupersededRotation>(&query)
            .bind(rotation_id)
            .fetch_optional(pool)
            .await
    }

    /// Compare-and-swap rotation.
    ///
    /// Replaces the session's rotation id and secret hash only if the row
    /// still carries `expected_rotation_id` and is not revoked. The replaced
    /// id is recorded in `superseded_rotations` in the same transaction,
    /// retained until the old credential would have expired.
    ///
    /// Returns `None` when the swap lost (another rotation or a revocation
    /// got there first); nothing is written in that case.
    pub async fn rotate(
        pool: &PgPool,
        session_id: DbId,
        expected_rotation_id: Uuid,
        input: &RotateSession,
    ) -> Result<Option<UserSession>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        // Row lock: a concurrent rotation blocks here, then re-checks the
        // predicate against the committed row and finds nothing.
        let prior = sqlx::query_as::<_, (DbId, String, Timestamp)>(
            "SELECT user_id, secret_hash, expires_at FROM user_sessions
             WHERE id = $1 AND rotation_id = $2 AND is_revoked = false
             FOR UPDATE",
        )
        .bind(session_id)
        .bind(expected_rotation_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((user_id, prior_hash, prior_expires_at)) = prior else {
            tx.rollback().await?;
            return Ok(None);
        };

        let query = format!(
            "UPDATE user_sessions SET
                rotation_id = $3,
                secret_hash = $4,
                issued_at = NOW(),
                expires_at = $5,
                client_ip = $6,
                user_agent = $7
             WHERE id = $1 AND rotation_id = $2 AND is_revoked = false
             RETURNING {COLUMNS}"
        );
        let rotated = sqlx::query_as::<_, UserSession>(&query)
            .bind(session_id)
            .bind(expected_rotation_id)
            .bind(input.rotation_id)
            .bind(&input.secret_hash)
            .bind(input.expires_at)
            .bind(&input.client_ip)
            .bind(&input.user_agent)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(rotated) = rotated else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            "INSERT INTO superseded_rotations
                (rotation_id, session_id, user_id, secret_hash, retain_until)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(expected_rotation_id)
        .bind(session_id)
        .bind(user_id)
        .bind(&prior_hash)
        .bind(prior_expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(rotated))
    }

    /// Revoke the session currently identified by `rotation_id`.
    ///
    /// Returns `true` if a live row was flipped; unknown or already revoked
    /// sessions return `false`.
    pub async fn revoke_by_rotation_id(
        pool: &PgPool,
        rotation_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_sessions SET is_revoked = true
             WHERE rotation_id = $1 AND is_revoked = false",
        )
        .bind(rotation_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke all sessions for a user. Returns the count of revoked sessions.
    pub async fn revoke_all_for_user(pool: &PgPool, user_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_sessions SET is_revoked = true
             WHERE user_id = $1 AND is_revoked = false",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// List a user's sessions that are neither revoked nor expired, newest first.
    pub async fn list_active_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<UserSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_sessions
             WHERE user_id = $1 AND is_revoked = false AND expires_at > NOW()
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, UserSession>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Delete expired sessions and lapsed superseded ids.
    ///
    /// Revoked sessions are kept until their natural expiry so a revoked
    /// credential keeps being reported as revoked rather than unknown.
    ///
    /// Returns the total number of deleted rows across both tables.
    pub async fn cleanup_expired(pool: &PgPool, now: Timestamp) -> Result<u64, sqlx::Error> {
        let sessions = sqlx::query("DELETE FROM user_sessions WHERE expires_at < $1")
            .bind(now)
            .execute(pool)
            .await?;
        let superseded = sqlx::query("DELETE FROM superseded_rotations WHERE retain_until < $1")
            .bind(now)
            .execute(pool)
            .await?;
        Ok(sessions.rows_affected() + superseded.rows_affected())
    }
}
