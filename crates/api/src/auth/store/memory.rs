//! In-process [`SessionStore`] with the same compare-and-swap semantics as
//! the PostgreSQL store. Nothing survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use orbit_core::types::{DbId, Timestamp};
use orbit_db::models::session::{CreateSession, RotateSession, SupersededRotation, UserSession};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{SessionStore, UserDirectory};
use crate::auth::session::SessionUser;

#[derive(Default)]
struct Tables {
    next_id: DbId,
    sessions: HashMap<DbId, UserSession>,
    by_rotation: HashMap<Uuid, DbId>,
    superseded: HashMap<Uuid, SupersededRotation>,
    users: HashMap<DbId, SessionUser>,
}

/// Session and user tables behind one `RwLock`.
#[derive(Default)]
pub struct MemorySessionStore {
    tables: RwLock<Tables>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user so refreshes can resolve their role.
    pub async fn add_user(&self, user: SessionUser) {
        self.tables.write().await.users.insert(user.user_id, user);
    }

    /// Remove a user, as if the account had been deleted.
    pub async fn remove_user(&self, user_id: DbId) {
        self.tables.write().await.users.remove(&user_id);
    }

    /// Snapshot of a session row by session id.
    pub async fn session(&self, session_id: DbId) -> Option<UserSession> {
        self.tables.read().await.sessions.get(&session_id).cloned()
    }

    /// All session rows, in session-id order.
    pub async fn sessions(&self) -> Vec<UserSession> {
        let tables = self.tables.read().await;
        let mut rows: Vec<_> = tables.sessions.values().cloned().collect();
        rows.sort_by_key(|s| s.id);
        rows
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, input: CreateSession) -> Result<UserSession, sqlx::Error> {
        let mut tables = self.tables.write().await;
        if tables.by_rotation.contains_key(&input.rotation_id) {
            return Err(sqlx::Error::Protocol(format!(
                "duplicate rotation id {}",
                input.rotation_id
            )));
        }

        tables.next_id += 1;
        let now = Utc::now();
        let session = UserSession {
            id: tables.next_id,
            user_id: input.user_id,
            rotation_id: input.rotation_id,
            secret_hash: input.secret_hash,
            issued_at: now,
            expires_at: input.expires_at,
            is_revoked: false,
            client_ip: input.client_ip,
            user_agent: input.user_agent,
            created_at: now,
            updated_at: now,
        };
        tables.by_rotation.insert(session.rotation_id, session.id);
        tables.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_by_rotation_id(
        &self,
        rotation_id: Uuid,
    ) -> Result<Option<UserSession>, sqlx::Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_rotation
            .get(&rotation_id)
            .and_then(|id| tables.sessions.get(id))
            .cloned())
    }

    async fn find_superseded(
        &self,
        rotation_id: Uuid,
    ) -> Result<Option<SupersededRotation>, sqlx::Error> {
        Ok(self.tables.read().await.superseded.get(&rotation_id).cloned())
    }

    async fn rotate(
        &self,
        session_id: DbId,
        expected_rotation_id: Uuid,
        next: RotateSession,
    ) -> Result<Option<UserSession>, sqlx::Error> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        let Some(session) = tables.sessions.get_mut(&session_id) else {
            return Ok(None);
        };
        if session.rotation_id != expected_rotation_id || session.is_revoked {
            return Ok(None);
        }

        let now = Utc::now();
        let retained = SupersededRotation {
            rotation_id: session.rotation_id,
            session_id,
            user_id: session.user_id,
            secret_hash: std::mem::replace(&mut session.secret_hash, next.secret_hash),
            superseded_at: now,
            retain_until: session.expires_at,
        };
        session.rotation_id = next.rotation_id;
        session.issued_at = now;
        session.expires_at = next.expires_at;
        session.client_ip = next.client_ip;
        session.user_agent = next.user_agent;
        session.updated_at = now;
        let rotated = session.clone();

        tables.by_rotation.remove(&expected_rotation_id);
        tables.by_rotation.insert(rotated.rotation_id, session_id);
        tables.superseded.insert(expected_rotation_id, retained);
        Ok(Some(rotated))
    }

    async fn revoke(&self, rotation_id: Uuid) -> Result<bool, sqlx::Error> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        let session = tables
            .by_rotation
            .get(&rotation_id)
            .and_then(|id| tables.sessions.get_mut(id));
        match session {
            Some(session) if !session.is_revoked => {
                session.is_revoked = true;
                session.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_user(&self, user_id: DbId) -> Result<u64, sqlx::Error> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let mut revoked = 0;
        for session in tables.sessions.values_mut() {
            if session.user_id == user_id && !session.is_revoked {
                session.is_revoked = true;
                session.updated_at = now;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn list_active_for_user(&self, user_id: DbId) -> Result<Vec<UserSession>, sqlx::Error> {
        let tables = self.tables.read().await;
        let now = Utc::now();
        let mut rows: Vec<_> = tables
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.is_active_at(now))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn purge_expired(&self, now: Timestamp) -> Result<u64, sqlx::Error> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        let dead: Vec<(DbId, Uuid)> = tables
            .sessions
            .values()
            .filter(|s| s.expires_at < now)
            .map(|s| (s.id, s.rotation_id))
            .collect();
        for (id, rotation_id) in &dead {
            tables.sessions.remove(id);
            tables.by_rotation.remove(rotation_id);
        }

        let before = tables.superseded.len();
        tables.superseded.retain(|_, r| r.retain_until >= now);
        let lapsed = before - tables.superseded.len();

        Ok((dead.len() + lapsed) as u64)
    }
}

#[async_trait]
impl UserDirectory for MemorySessionStore {
    async fn find_session_user(&self, user_id: DbId) -> Result<Option<SessionUser>, sqlx::Error> {
        Ok(self.tables.read().await.users.get(&user_id).copied())
    }
}
