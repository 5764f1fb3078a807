//! Periodic purge of expired sessions.
//!
//! Deletes sessions past `expires_at` and superseded rotation ids whose
//! retention deadline has passed. Revoked sessions stay until they expire so
//! their credentials keep resolving to "revoked".

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::auth::store::SessionStore;

/// Run the session cleanup loop until `cancel` is triggered.
///
/// The first pass runs immediately. A zero period is refused.
pub async fn run(store: Arc<dyn SessionStore>, every: Duration, cancel: CancellationToken) {
    if every.is_zero() {
        tracing::error!("Session cleanup job not started: interval must be non-zero");
        return;
    }
    tracing::info!(interval_secs = every.as_secs(), "Session cleanup job started");

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session cleanup job stopping");
                break;
            }
            _ = interval.tick() => {
                match store.purge_expired(Utc::now()).await {
                    Ok(deleted) if deleted > 0 => {
                        tracing::info!(deleted, "Session cleanup: purged expired rows");
                    }
                    Ok(_) => tracing::debug!("Session cleanup: nothing to purge"),
                    Err(e) => {
                        tracing::error!(error = %e, "Session cleanup: purge failed");
                    }
                }
            }
        }
    }
}
