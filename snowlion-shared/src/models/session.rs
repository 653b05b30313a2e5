//! Bearer session model
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE sessions (
//!     id UUID PRIMARY KEY,
//!     user_id UUID NOT NULL REFERENCES users(id),
//!     token_hash CHAR(64) NOT NULL UNIQUE,
//!     expires_at TIMESTAMPTZ NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session row
///
/// The bearer token itself is never stored, only its SHA-256 digest.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A session is live up to and including `expires_at`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Input for inserting a session row
#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl NewSession {
    pub fn into_session(self) -> Session {
        Session {
            id: self.id,
            user_id: self.user_id,
            token_hash: self.token_hash,
            expires_at: self.expires_at,
            created_at: self.created_at,
        }
    }
}

/// Session joined with the owning user's fields
///
/// Produced by a session lookup and attached to authenticated requests.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionUser {
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub email: String,
    pub company_name: Option<String>,
    pub industry: Option<String>,
    pub trial_ends_at: DateTime<Utc>,
    pub email_verified: bool,
    pub is_active: bool,
}

impl SessionUser {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
