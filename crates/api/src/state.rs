use std::sync::Arc;

use crate::auth::jwt::{KeyError, TokenSigner};
use crate::auth::password::{Argon2Verifier, CredentialVerifier};
use crate::auth::session::SessionManager;
use crate::auth::store::PgSessionStore;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: orbit_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Session engine: login, refresh rotation, revocation, access checks.
    pub sessions: SessionManager,
    /// Hashes and verifies user passwords.
    pub passwords: Arc<dyn CredentialVerifier>,
}

impl AppState {
    /// Wire the PostgreSQL-backed session engine from configuration.
    ///
    /// Fails only if the configured signing key does not parse.
    pub fn new(pool: orbit_db::DbPool, config: Arc<ServerConfig>) -> Result<Self, KeyError> {
        let signer = TokenSigner::new(&config.jwt)?;
        let store = Arc::new(PgSessionStore::new(pool.clone()));
        let sessions = SessionManager::new(
            store.clone(),
            store,
            config.refresh_hasher.build(),
            signer,
            config.session.clone(),
        );

        Ok(Self {
            pool,
            config,
            sessions,
            passwords: Arc::new(Argon2Verifier),
        })
    }
}
