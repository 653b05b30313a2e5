//! Error kinds surfaced by the core components
//!
//! Every variant is terminal for the request that produced it; nothing in the
//! core retries. Storage faults are wrapped in [`CoreError::Storage`] so the
//! HTTP layer can report them as a generic internal failure.
//!
//! # Example
//!
//! ```
//! use snowlion_shared::error::CoreError;
//!
//! let err = CoreError::InvalidRange { min: 1, max: 365, actual: 400 };
//! assert_eq!(err.to_string(), "value 400 is outside the allowed range 1..=365");
//! ```

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::store::StoreError;

/// Result alias used by the core components
pub type CoreResult<T> = Result<T, CoreError>;

/// Error type for authentication, trial and quota operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Another account already uses this email (case-insensitive)
    #[error("Email already registered")]
    DuplicateEmail,

    /// No pending verification or login matches the token
    #[error("Invalid token")]
    InvalidToken,

    /// The token matched but its validity window has passed
    #[error("Token expired")]
    TokenExpired,

    /// No active account exists for the email
    #[error("User not found")]
    UserNotFound,

    /// The account exists but has not completed email verification
    #[error("Email not verified")]
    EmailNotVerified,

    /// Target user does not exist
    #[error("User {0} not found")]
    NotFound(Uuid),

    /// Numeric argument outside its accepted bounds
    #[error("value {actual} is outside the allowed range {min}..={max}")]
    InvalidRange { min: i64, max: i64, actual: i64 },

    /// No live session for the presented bearer token
    #[error("Not authenticated")]
    Unauthenticated,

    /// The trial window has closed
    #[error("Trial expired at {trial_ends_at}")]
    TrialExpired { trial_ends_at: DateTime<Utc> },

    /// Weekly document limit reached
    #[error("Weekly document limit reached ({used}/{limit})")]
    QuotaExceeded { limit: u32, used: u32 },

    /// Feedback submitted with every field blank
    #[error("Please provide at least one feedback field")]
    EmptyFeedback,

    /// Storage layer failure
    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl CoreError {
    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::DuplicateEmail => "duplicate_email",
            CoreError::InvalidToken => "invalid_token",
            CoreError::TokenExpired => "token_expired",
            CoreError::UserNotFound => "user_not_found",
            CoreError::EmailNotVerified => "email_not_verified",
            CoreError::NotFound(_) => "not_found",
            CoreError::InvalidRange { .. } => "invalid_range",
            CoreError::Unauthenticated => "unauthenticated",
            CoreError::TrialExpired { .. } => "trial_expired",
            CoreError::QuotaExceeded { .. } => "quota_exceeded",
            CoreError::EmptyFeedback => "empty_feedback",
            CoreError::Storage(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(CoreError::DuplicateEmail.to_string(), "Email already registered");
        assert_eq!(
            CoreError::QuotaExceeded { limit: 10, used: 10 }.to_string(),
            "Weekly document limit reached (10/10)"
        );

        let id = Uuid::nil();
        assert!(CoreError::NotFound(id).to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let errors = [
            CoreError::DuplicateEmail,
            CoreError::InvalidToken,
            CoreError::TokenExpired,
            CoreError::UserNotFound,
            CoreError::EmailNotVerified,
            CoreError::NotFound(Uuid::nil()),
            CoreError::InvalidRange { min: 1, max: 365, actual: 0 },
            CoreError::Unauthenticated,
            CoreError::TrialExpired { trial_ends_at: Utc::now() },
            CoreError::QuotaExceeded { limit: 1, used: 1 },
            CoreError::EmptyFeedback,
        ];

        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_storage_error_is_generic() {
        let err = CoreError::from(StoreError::UniqueViolation("sessions_token_hash_key".into()));
        assert_eq!(err.code(), "internal_error");
    }
}
