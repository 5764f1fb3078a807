//! The refresh-session engine.
//!
//! A session is one row in the store, identified by a stable `session_id` and
//! by a `rotation_id` that changes on every refresh. A client holds the
//! refresh credential `<rotation_id>.<secret>`; the store holds only a hash of
//! the secret. Each refresh swaps both halves for new ones through a
//! compare-and-swap on the expected `rotation_id`, so at most one of several
//! concurrent refreshes with the same credential can win.
//!
//! Replaying a rotated-away credential is treated as theft: every session of
//! the user is revoked. The revocation fan-out is retried with exponential
//! backoff until it succeeds; retries that outlive the request run on a
//! [`TaskTracker`] that [`SessionManager::shutdown`] drains.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use orbit_core::refresh_token::{MalformedCredential, RefreshCredential};
use orbit_core::roles::Role;
use orbit_core::types::{DbId, Timestamp};
use orbit_db::models::session::{CreateSession, RotateSession, UserSession};
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use super::jwt::{AccessClaims, SignatureError, TokenSigner};
use super::password::{CredentialVerifier, HashError};
use super::store::{SessionStore, UserDirectory};
use crate::config::{env_or, ConfigError};

/// Default sliding refresh window in days.
const DEFAULT_REFRESH_WINDOW_DAYS: i64 = 30;

/// Backoff schedule for the revoke-all fan-out.
///
/// Delay before retry `n` (1-based) is
/// `min(initial_delay * multiplier^(n-1), max_delay)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts made inline before handing off to a background task.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay = self.initial_delay.as_secs_f64() * factor;
        if !delay.is_finite() || delay >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(delay)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Lifetimes and retry behaviour of the session engine.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    /// How long a refresh credential stays usable; renewed on every rotation.
    pub refresh_window: chrono::Duration,
    pub revoke_retry: RetryPolicy,
}

impl SessionPolicy {
    /// Load the session policy from environment variables.
    ///
    /// | Env Var                     | Default |
    /// |-----------------------------|---------|
    /// | `REFRESH_TOKEN_EXPIRY_DAYS` | `30`    |
    pub fn from_env() -> Result<Self, ConfigError> {
        let days: i64 = env_or("REFRESH_TOKEN_EXPIRY_DAYS", DEFAULT_REFRESH_WINDOW_DAYS)?;
        if days <= 0 {
            return Err(ConfigError::Invalid {
                name: "REFRESH_TOKEN_EXPIRY_DAYS",
                reason: "must be positive".into(),
            });
        }
        Ok(Self {
            refresh_window: chrono::Duration::days(days),
            revoke_retry: RetryPolicy::default(),
        })
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            refresh_window: chrono::Duration::days(DEFAULT_REFRESH_WINDOW_DAYS),
            revoke_retry: RetryPolicy::default(),
        }
    }
}

/// Advisory request metadata recorded on the session row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// The identity an access token is minted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: DbId,
    pub role: Role,
}

/// A freshly issued access/refresh pair.
#[derive(Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// Opaque `<rotation_id>.<secret>`; shown to the client exactly once.
    pub refresh_token: String,
    pub user_id: DbId,
    /// Role the access token was minted with.
    pub role: Role,
    pub session_id: DbId,
    pub rotation_id: Uuid,
    pub refresh_expires_at: Timestamp,
}

impl fmt::Debug for IssuedTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedTokens")
            .field("expires_in", &self.expires_in)
            .field("user_id", &self.user_id)
            .field("role", &self.role)
            .field("session_id", &self.session_id)
            .field("rotation_id", &self.rotation_id)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish_non_exhaustive()
    }
}

/// Proof that a rotation id names a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub session_id: DbId,
    pub user_id: DbId,
    pub rotation_id: Uuid,
    pub expires_at: Timestamp,
}

/// A verified access token together with its live session.
#[derive(Debug, Clone)]
pub struct AuthorizedAccess {
    pub claims: AccessClaims,
    pub session: ActiveSession,
}

/// Failure of a session-engine operation.
///
/// Only [`SessionError::Store`], [`SessionError::Hash`], and
/// [`SessionError::Signing`] are infrastructure failures; every other variant
/// is an authentication decision.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    MalformedCredential(#[from] MalformedCredential),

    #[error("refresh credential not recognised")]
    InvalidCredential,

    #[error("session expired or revoked")]
    ExpiredOrRevoked,

    #[error("refresh credential reuse detected")]
    ReuseDetected,

    #[error("session was rotated by a concurrent request")]
    ConcurrentRotationLost,

    #[error("session revoked or expired")]
    SessionRevokedOrExpired,

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("failed to sign access token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error("session store error: {0}")]
    Store(#[from] sqlx::Error),
}

/// Login, refresh rotation, reuse detection, and revocation.
///
/// Holds no session state of its own; every call is a round trip to the
/// store. Cheap to clone; clones share the background retry tracker.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    users: Arc<dyn UserDirectory>,
    verifier: Arc<dyn CredentialVerifier>,
    signer: TokenSigner,
    policy: SessionPolicy,
    background: TaskTracker,
    /// Users whose revoke-all is still being retried in the background.
    pending_revocations: Arc<Mutex<BTreeSet<DbId>>>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        users: Arc<dyn UserDirectory>,
        verifier: Arc<dyn CredentialVerifier>,
        signer: TokenSigner,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            store,
            users,
            verifier,
            signer,
            policy,
            background: TaskTracker::new(),
            pending_revocations: Arc::default(),
        }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Start a new lineage for an authenticated user.
    pub async fn create_session(
        &self,
        user: SessionUser,
        client: ClientInfo,
    ) -> Result<IssuedTokens, SessionError> {
        let credential = RefreshCredential::generate();
        let secret_hash = self.verifier.hash(credential.secret()).await?;

        let session = self
            .store
            .insert(CreateSession {
                user_id: user.user_id,
                rotation_id: credential.rotation_id(),
                secret_hash,
                expires_at: Utc::now() + self.policy.refresh_window,
                client_ip: client.ip,
                user_agent: client.user_agent,
            })
            .await?;

        tracing::info!(
            user_id = user.user_id,
            session_id = session.id,
            "Session created"
        );
        self.issue(user, &session, &credential)
    }

    /// Exchange a refresh credential for a new pair, rotating the session.
    pub async fn refresh(
        &self,
        raw: &str,
        client: ClientInfo,
    ) -> Result<IssuedTokens, SessionError> {
        let presented = RefreshCredential::parse(raw)?;
        let rotation_id = presented.rotation_id();

        let Some(session) = self.store.find_by_rotation_id(rotation_id).await? else {
            return Err(self.reject_unknown(&presented).await);
        };

        if !session.is_active_at(Utc::now()) {
            return Err(SessionError::ExpiredOrRevoked);
        }

        if !self
            .verifier
            .verify(presented.secret(), &session.secret_hash)
            .await?
        {
            self.contain_reuse(session.user_id, session.id).await;
            return Err(SessionError::ReuseDetected);
        }

        let Some(user) = self.users.find_session_user(session.user_id).await? else {
            self.store.revoke(rotation_id).await?;
            tracing::info!(
                user_id = session.user_id,
                session_id = session.id,
                "Session revoked; user no longer exists"
            );
            return Err(SessionError::InvalidCredential);
        };

        let next = RefreshCredential::generate();
        let secret_hash = self.verifier.hash(next.secret()).await?;
        let rotated = self
            .store
            .rotate(
                session.id,
                rotation_id,
                RotateSession {
                    rotation_id: next.rotation_id(),
                    secret_hash,
                    expires_at: Utc::now() + self.policy.refresh_window,
                    client_ip: client.ip,
                    user_agent: client.user_agent,
                },
            )
            .await?;

        let Some(rotated) = rotated else {
            tracing::debug!(session_id = session.id, "Rotation lost to a concurrent refresh");
            return Err(SessionError::ConcurrentRotationLost);
        };

        tracing::debug!(
            user_id = user.user_id,
            session_id = rotated.id,
            "Session rotated"
        );
        self.issue(user, &rotated, &next)
    }

    /// Revoke the session a refresh credential belongs to.
    ///
    /// Unknown and already-revoked sessions are not an error.
    pub async fn logout(&self, raw: &str) -> Result<(), SessionError> {
        let credential = RefreshCredential::parse(raw)?;
        let revoked = self.store.revoke(credential.rotation_id()).await?;
        tracing::debug!(rotation_id = %credential.rotation_id(), revoked, "Logout");
        Ok(())
    }

    /// Confirm that `rotation_id` names a live session.
    pub async fn validate_access(&self, rotation_id: Uuid) -> Result<ActiveSession, SessionError> {
        match self.store.find_by_rotation_id(rotation_id).await? {
            Some(session) if session.is_active_at(Utc::now()) => Ok(ActiveSession {
                session_id: session.id,
                user_id: session.user_id,
                rotation_id: session.rotation_id,
                expires_at: session.expires_at,
            }),
            _ => Err(SessionError::SessionRevokedOrExpired),
        }
    }

    /// Verify an access token's signature and expiry, then its session.
    pub async fn authorize(&self, token: &str) -> Result<AuthorizedAccess, SessionError> {
        let claims = self.signer.verify(token)?;
        let session = self.validate_access(claims.rid).await?;
        if session.user_id != claims.sub {
            tracing::warn!(
                sub = claims.sub,
                session_user_id = session.user_id,
                "Access token subject does not own its session"
            );
            return Err(SessionError::SessionRevokedOrExpired);
        }
        Ok(AuthorizedAccess { claims, session })
    }

    /// Revoke every session of a user.
    ///
    /// Store failures are retried inline per [`RetryPolicy`]. If that budget
    /// runs out the error is returned and a background task keeps retrying
    /// until the revocation lands.
    pub async fn revoke_all(&self, user_id: DbId) -> Result<u64, SessionError> {
        match self.revoke_all_inline(user_id).await {
            Ok(revoked) => Ok(revoked),
            Err(err) => {
                self.spawn_revoke_retry(user_id).await;
                Err(err.into())
            }
        }
    }

    /// Users whose revoke-all has not landed yet, in id order.
    pub async fn pending_revocations(&self) -> Vec<DbId> {
        self.pending_revocations.lock().await.iter().copied().collect()
    }

    /// Wait up to `grace` for background revocations to finish.
    ///
    /// Returns the users whose revocation was still pending when the grace
    /// period ran out; each is logged at error level.
    pub async fn shutdown(&self, grace: Duration) -> Vec<DbId> {
        self.background.close();
        if tokio::time::timeout(grace, self.background.wait())
            .await
            .is_ok()
        {
            return Vec::new();
        }

        let pending = self.pending_revocations().await;
        for user_id in &pending {
            tracing::error!(
                user_id = *user_id,
                "Revoke-all still pending at shutdown; sessions may remain active"
            );
        }
        pending
    }

    /// Active sessions of a user, newest first.
    pub async fn list_sessions(&self, user_id: DbId) -> Result<Vec<UserSession>, SessionError> {
        Ok(self.store.list_active_for_user(user_id).await?)
    }

    /// Outcome for a rotation id with no current row.
    ///
    /// A retained superseded id whose secret still verifies is a replay of a
    /// credential that was already rotated away. Anything else is reported
    /// the same as an id that never existed.
    async fn reject_unknown(&self, presented: &RefreshCredential) -> SessionError {
        let superseded = match self.store.find_superseded(presented.rotation_id()).await {
            Ok(Some(row)) if row.retain_until > Utc::now() => row,
            Ok(_) => return SessionError::InvalidCredential,
            Err(err) => return err.into(),
        };

        match self
            .verifier
            .verify(presented.secret(), &superseded.secret_hash)
            .await
        {
            Ok(true) => {
                self.contain_reuse(superseded.user_id, superseded.session_id)
                    .await;
                SessionError::ReuseDetected
            }
            Ok(false) => SessionError::InvalidCredential,
            Err(err) => err.into(),
        }
    }

    async fn contain_reuse(&self, user_id: DbId, session_id: DbId) {
        tracing::warn!(user_id, session_id, "Refresh credential reuse detected");
        match self.revoke_all(user_id).await {
            Ok(revoked) => {
                tracing::warn!(user_id, revoked, "Revoked all sessions after reuse");
            }
            Err(err) => {
                tracing::error!(
                    user_id,
                    error = %err,
                    "Revocation after reuse deferred to background retry"
                );
            }
        }
    }

    async fn revoke_all_inline(&self, user_id: DbId) -> Result<u64, sqlx::Error> {
        let retry = &self.policy.revoke_retry;
        let mut attempt = 1;
        loop {
            match self.store.revoke_all_for_user(user_id).await {
                Ok(revoked) => return Ok(revoked),
                Err(err) if attempt < retry.max_attempts => {
                    let delay = retry.delay_for(attempt);
                    tracing::warn!(
                        user_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Revoke-all failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn spawn_revoke_retry(&self, user_id: DbId) {
        if !self.pending_revocations.lock().await.insert(user_id) {
            tracing::debug!(user_id, "Deferred revoke-all already running");
            return;
        }

        let store = Arc::clone(&self.store);
        let pending = Arc::clone(&self.pending_revocations);
        let retry = self.policy.revoke_retry.clone();
        self.background.spawn(async move {
            let mut attempt = retry.max_attempts;
            loop {
                tokio::time::sleep(retry.delay_for(attempt)).await;
                attempt = attempt.saturating_add(1);
                match store.revoke_all_for_user(user_id).await {
                    Ok(revoked) => {
                        pending.lock().await.remove(&user_id);
                        tracing::info!(user_id, revoked, attempt, "Deferred revoke-all completed");
                        return;
                    }
                    Err(err) => {
                        tracing::warn!(user_id, attempt, error = %err, "Deferred revoke-all failed");
                    }
                }
            }
        });
    }

    fn issue(
        &self,
        user: SessionUser,
        session: &UserSession,
        credential: &RefreshCredential,
    ) -> Result<IssuedTokens, SessionError> {
        let access = self
            .signer
            .issue(user.user_id, user.role, session.rotation_id)?;
        Ok(IssuedTokens {
            expires_in: access.expires_in(),
            access_token: access.token,
            refresh_token: credential.encode(),
            user_id: user.user_id,
            role: user.role,
            session_id: session.id,
            rotation_id: session.rotation_id,
            refresh_expires_at: session.expires_at,
        })
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("signer", &self.signer)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
