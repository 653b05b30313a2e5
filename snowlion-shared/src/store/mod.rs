//! Storage abstraction.
//!
//! The core components talk to storage only through the traits in this
//! module. [`postgres::PgStore`] is the production implementation;
//! [`memory::MemoryStore`] backs unit tests and local experiments and
//! enforces the same uniqueness rules the database does.
//!
//! Conditional writes return `bool` so callers can tell "no row matched"
//! apart from a storage fault.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Feedback, NewFeedback, NewSession, NewUsageEntry, NewUser, Session, SessionUser,
    UsageLogEntry, User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Name of the case-insensitive unique index on `users.email`
pub const USERS_EMAIL_KEY: &str = "users_email_key";

/// Name of the unique constraint on `sessions.token_hash`
pub const SESSIONS_TOKEN_KEY: &str = "sessions_token_hash_key";

/// Storage error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write; carries the constraint name
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A referenced row does not exist; carries the constraint name
    #[error("foreign key violated: {0}")]
    ForeignKeyViolation(String),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    /// Whether this error is a violation of the named constraint
    pub fn violates(&self, constraint: &str) -> bool {
        matches!(self, StoreError::UniqueViolation(name) if name == constraint)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            match db_err.code().as_deref() {
                Some("23505") => return StoreError::UniqueViolation(constraint),
                Some("23503") => return StoreError::ForeignKeyViolation(constraint),
                _ => {}
            }
        }
        StoreError::Database(err)
    }
}

/// User rows.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user; fails with [`USERS_EMAIL_KEY`] on a case-insensitive email clash.
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Look up by email, case-insensitively.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Look up the user holding `token` whose verification flag equals `email_verified`.
    async fn find_user_by_token(
        &self,
        token: &str,
        email_verified: bool,
    ) -> Result<Option<User>, StoreError>;

    /// Replace the pending token. Returns false if the user does not exist.
    async fn set_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Clear the pending token only if it still equals `token`, optionally
    /// marking the email verified in the same write. Returns false if the token
    /// was already replaced or cleared.
    async fn clear_token(
        &self,
        id: Uuid,
        token: &str,
        mark_verified: bool,
    ) -> Result<bool, StoreError>;

    async fn set_trial_ends_at(&self, id: Uuid, ends_at: DateTime<Utc>) -> Result<bool, StoreError>;

    async fn deactivate_user(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Session rows, keyed by the token digest.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a session; fails with [`SESSIONS_TOKEN_KEY`] on a digest clash.
    async fn insert_session(&self, session: NewSession) -> Result<Session, StoreError>;

    /// Session joined with its user, regardless of expiry or activity.
    async fn find_session(&self, token_hash: &str) -> Result<Option<SessionUser>, StoreError>;

    /// Returns whether a row was removed.
    async fn delete_session(&self, token_hash: &str) -> Result<bool, StoreError>;

    /// Remove every session that expired strictly before `now`.
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Usage ledger rows.
#[async_trait]
pub trait UsageRepository: Send + Sync {
    async fn insert_usage(&self, entry: NewUsageEntry) -> Result<UsageLogEntry, StoreError>;

    /// Most recent first.
    async fn list_usage(&self, user_id: Uuid, limit: i64) -> Result<Vec<UsageLogEntry>, StoreError>;

    /// Entries with `action`, created at or after `since` when given.
    async fn count_usage(
        &self,
        user_id: Uuid,
        action: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64, StoreError>;

    /// Sum of `tokens_used` across all of the user's entries.
    async fn sum_tokens(&self, user_id: Uuid) -> Result<i64, StoreError>;
}

/// Feedback rows.
#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    async fn insert_feedback(&self, feedback: NewFeedback) -> Result<Feedback, StoreError>;

    /// The user's own submissions, most recent first.
    async fn list_feedback(&self, user_id: Uuid) -> Result<Vec<Feedback>, StoreError>;
}

/// Liveness check for the backing store.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Everything the service needs from one storage handle.
pub trait Store:
    UserRepository + SessionRepository + UsageRepository + FeedbackRepository + HealthCheck
{
}

impl<T> Store for T where
    T: UserRepository + SessionRepository + UsageRepository + FeedbackRepository + HealthCheck
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violates_matches_constraint_name() {
        let err = StoreError::UniqueViolation(USERS_EMAIL_KEY.to_string());
        assert!(err.violates(USERS_EMAIL_KEY));
        assert!(!err.violates(SESSIONS_TOKEN_KEY));
    }

    #[test]
    fn test_non_database_sqlx_error_is_not_unique_violation() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
    }
}
