//! Bearer session store
//!
//! Sessions are opaque tokens valid for seven days. Only the SHA-256 digest
//! of a token is persisted; the plaintext exists in the [`IssuedSession`]
//! handed to the client and nowhere else.
//!
//! Expiry is checked when a token is presented: an expired row is deleted on
//! the spot and the lookup reports no session. [`SessionStore::purge_expired`]
//! reclaims rows nobody presents again.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::{generate_token, hash_token, is_well_formed};
use crate::clock::Clock;
use crate::error::CoreResult;
use crate::models::{NewSession, SessionUser};
use crate::store::SessionRepository;

/// Session lifetime
pub const SESSION_TTL_DAYS: i64 = 7;

/// Token handed to the client after login
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(sessions: Arc<dyn SessionRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { sessions, clock }
    }

    /// Issues a seven-day session for `user_id`
    pub async fn create(&self, user_id: Uuid) -> CoreResult<IssuedSession> {
        let now = self.clock.now();
        let token = generate_token();
        let session = self
            .sessions
            .insert_session(NewSession {
                id: Uuid::new_v4(),
                user_id,
                token_hash: hash_token(&token),
                expires_at: now + Duration::days(SESSION_TTL_DAYS),
                created_at: now,
            })
            .await?;

        info!(user_id = %user_id, session_id = %session.id, "Session created");
        Ok(IssuedSession {
            token,
            user_id,
            expires_at: session.expires_at,
        })
    }

    /// Resolves a bearer token to its session and user
    ///
    /// Returns `None` for malformed or unknown tokens, expired sessions and
    /// sessions of deactivated users alike. An expired session is deleted as
    /// a side effect.
    pub async fn validate(&self, token: &str) -> CoreResult<Option<SessionUser>> {
        if !is_well_formed(token) {
            debug!("Malformed session token");
            return Ok(None);
        }

        let token_hash = hash_token(token);
        let Some(session) = self.sessions.find_session(&token_hash).await? else {
            debug!("Session lookup miss");
            return Ok(None);
        };

        if session.is_expired_at(self.clock.now()) {
            self.sessions.delete_session(&token_hash).await?;
            debug!(session_id = %session.session_id, "Expired session removed");
            return Ok(None);
        }

        if !session.is_active {
            debug!(user_id = %session.user_id, "Session belongs to inactive user");
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Removes the session if present
    pub async fn delete(&self, token: &str) -> CoreResult<()> {
        if !is_well_formed(token) {
            return Ok(());
        }
        if self.sessions.delete_session(&hash_token(token)).await? {
            debug!("Session deleted");
        }
        Ok(())
    }

    /// Deletes every session whose expiry has passed
    ///
    /// # Returns
    ///
    /// Number of rows removed
    pub async fn purge_expired(&self) -> CoreResult<u64> {
        let removed = self.sessions.delete_expired_sessions(self.clock.now()).await?;
        if removed > 0 {
            info!(removed, "Purged expired sessions");
        }
        Ok(removed)
    }
}
