//! Periodic removal of expired sessions
//!
//! Expired sessions are already rejected on lookup; the sweep only reclaims
//! their rows.

use snowlion_shared::sessions::SessionStore;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Spawns the sweep; the first pass runs immediately
pub fn spawn_session_reaper(sessions: SessionStore, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match sessions.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "Purged expired sessions"),
                Err(e) => tracing::error!(error = %e, "Expired session sweep failed"),
            }
        }
    })
}
