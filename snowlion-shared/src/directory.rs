//! User directory
//!
//! Owns the user record lifecycle: signup, email verification, issuance and
//! consumption of magic-link login tokens, trial extension and deactivation.
//!
//! # Shared token column
//!
//! A user row holds at most one pending token. Until the email is verified it
//! is the 24-hour verification token; afterwards it is the most recent
//! 15-minute login token. Requesting a login token therefore overwrites any
//! token still outstanding for that user, including an unused verification
//! token.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use snowlion_shared::clock::SystemClock;
//! use snowlion_shared::config::PolicyConfig;
//! use snowlion_shared::directory::{CreateUser, UserDirectory};
//! use snowlion_shared::store::MemoryStore;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = UserDirectory::new(
//!     MemoryStore::arc(),
//!     Arc::new(SystemClock),
//!     PolicyConfig::default(),
//! );
//!
//! let user = directory.create_user(CreateUser::new("ops@example.com")).await?;
//! let token = user.verification_token.clone().unwrap();
//! let verified = directory.verify_email(&token).await?;
//! assert!(verified.email_verified);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{generate_token, is_well_formed};
use crate::clock::Clock;
use crate::config::{PolicyConfig, MAX_TRIAL_DURATION_DAYS, MIN_TRIAL_DURATION_DAYS};
use crate::error::{CoreError, CoreResult};
use crate::models::{Industry, NewUser, User};
use crate::store::{UserRepository, USERS_EMAIL_KEY};

/// Validity of the signup verification token
pub const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;

/// Validity of a magic-link login token
pub const LOGIN_TOKEN_TTL_MINUTES: i64 = 15;

/// Smallest accepted trial extension
pub const MIN_TRIAL_EXTENSION_DAYS: i64 = 1;

/// Largest accepted trial extension
pub const MAX_TRIAL_EXTENSION_DAYS: i64 = 365;

/// Signup input
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub company_name: Option<String>,
    pub industry: Option<Industry>,
    pub company_size: Option<String>,
}

impl CreateUser {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            company_name: None,
            industry: None,
            company_size: None,
        }
    }
}

/// A freshly issued login token
#[derive(Debug, Clone)]
pub struct LoginToken {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// New trial end after extending by `days`
///
/// Extends from the current end while the trial is running, and from `now`
/// once it has lapsed.
///
/// # Example
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use snowlion_shared::directory::extended_trial_end;
///
/// let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
/// let future = now + Duration::days(3);
/// assert_eq!(extended_trial_end(future, now, 10), future + Duration::days(10));
///
/// let lapsed = now - Duration::days(3);
/// assert_eq!(extended_trial_end(lapsed, now, 10), now + Duration::days(10));
/// ```
pub fn extended_trial_end(current: DateTime<Utc>, now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    current.max(now) + Duration::days(days)
}

/// User record operations
#[derive(Clone)]
pub struct UserDirectory {
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
    policy: PolicyConfig,
}

impl UserDirectory {
    pub fn new(users: Arc<dyn UserRepository>, clock: Arc<dyn Clock>, policy: PolicyConfig) -> Self {
        Self {
            users,
            clock,
            policy,
        }
    }

    /// Creates an unverified user with a fresh verification token
    ///
    /// The email is trimmed and lower-cased. `trial_ends_at` is exactly
    /// `created_at` plus the configured trial length.
    ///
    /// # Errors
    ///
    /// - [`CoreError::DuplicateEmail`] if the email is already registered in any letter case
    /// - [`CoreError::InvalidRange`] if the configured trial length does not fit in a timestamp
    pub async fn create_user(&self, input: CreateUser) -> CoreResult<User> {
        let now = self.clock.now();
        let email = input.email.trim().to_lowercase();

        let trial_days = self.policy.trial_duration_days;
        let trial_ends_at = Duration::try_days(trial_days)
            .and_then(|trial| now.checked_add_signed(trial))
            .ok_or(CoreError::InvalidRange {
                min: MIN_TRIAL_DURATION_DAYS,
                max: MAX_TRIAL_DURATION_DAYS,
                actual: trial_days,
            })?;

        let new_user = NewUser {
            id: Uuid::new_v4(),
            email,
            company_name: input.company_name,
            industry: input.industry,
            company_size: input.company_size,
            trial_ends_at,
            verification_token: generate_token(),
            verification_expires_at: now + Duration::hours(VERIFICATION_TOKEN_TTL_HOURS),
            created_at: now,
        };

        let user = self.users.insert_user(new_user).await.map_err(|e| {
            if e.violates(USERS_EMAIL_KEY) {
                CoreError::DuplicateEmail
            } else {
                CoreError::Storage(e)
            }
        })?;

        info!(
            user_id = %user.id,
            trial_ends_at = %user.trial_ends_at,
            "User created"
        );
        Ok(user)
    }

    /// Confirms the email of the unverified user holding `token`
    ///
    /// An expired token leaves the row untouched.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidToken`] if no unverified user holds the token
    /// - [`CoreError::TokenExpired`] if the 24-hour window has passed
    pub async fn verify_email(&self, token: &str) -> CoreResult<User> {
        if !is_well_formed(token) {
            warn!("Verification attempted with malformed token");
            return Err(CoreError::InvalidToken);
        }

        let mut user = self
            .users
            .find_user_by_token(token, false)
            .await?
            .ok_or_else(|| {
                warn!("Verification attempted with unknown token");
                CoreError::InvalidToken
            })?;

        self.ensure_token_live(&user)?;

        if !self.users.clear_token(user.id, token, true).await? {
            warn!(user_id = %user.id, "Verification token consumed concurrently");
            return Err(CoreError::InvalidToken);
        }

        user.email_verified = true;
        user.verification_token = None;
        user.verification_expires_at = None;

        info!(user_id = %user.id, "Email verified");
        Ok(user)
    }

    /// Issues a 15-minute login token for a verified, active user
    ///
    /// Overwrites any outstanding token for the user.
    ///
    /// # Errors
    ///
    /// - [`CoreError::UserNotFound`] if no active user has this email
    /// - [`CoreError::EmailNotVerified`] if the user has not verified yet
    pub async fn request_login_token(&self, email: &str) -> CoreResult<LoginToken> {
        let email = email.trim().to_lowercase();

        let user = match self.users.find_user_by_email(&email).await? {
            Some(user) if user.is_active => user,
            _ => {
                debug!("Login requested for unknown or inactive email");
                return Err(CoreError::UserNotFound);
            }
        };

        if !user.email_verified {
            debug!(user_id = %user.id, "Login requested before verification");
            return Err(CoreError::EmailNotVerified);
        }

        let token = generate_token();
        let expires_at = self.clock.now() + Duration::minutes(LOGIN_TOKEN_TTL_MINUTES);

        if !self.users.set_token(user.id, &token, expires_at).await? {
            return Err(CoreError::UserNotFound);
        }

        info!(user_id = %user.id, expires_at = %expires_at, "Login token issued");
        Ok(LoginToken {
            user_id: user.id,
            email: user.email,
            token,
            expires_at,
        })
    }

    /// Consumes a login token and returns the owner's id
    ///
    /// The token is cleared only if it still matches, so of two concurrent
    /// consumers at most one succeeds.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidToken`] if no verified, active user holds the token
    /// - [`CoreError::TokenExpired`] if the 15-minute window has passed
    pub async fn consume_login_token(&self, token: &str) -> CoreResult<Uuid> {
        if !is_well_formed(token) {
            warn!("Login attempted with malformed token");
            return Err(CoreError::InvalidToken);
        }

        let user = match self.users.find_user_by_token(token, true).await? {
            Some(user) if user.is_active => user,
            _ => {
                warn!("Login attempted with unknown token");
                return Err(CoreError::InvalidToken);
            }
        };

        self.ensure_token_live(&user)?;

        if !self.users.clear_token(user.id, token, false).await? {
            warn!(user_id = %user.id, "Login token consumed concurrently");
            return Err(CoreError::InvalidToken);
        }

        debug!(user_id = %user.id, "Login token consumed");
        Ok(user.id)
    }

    /// Loads a user by id
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the user does not exist
    pub async fn get_user(&self, user_id: Uuid) -> CoreResult<User> {
        self.users
            .find_user(user_id)
            .await?
            .ok_or(CoreError::NotFound(user_id))
    }

    /// Permanently deactivates a user
    ///
    /// Existing sessions stop validating immediately.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the user does not exist
    pub async fn deactivate(&self, user_id: Uuid) -> CoreResult<()> {
        if !self.users.deactivate_user(user_id).await? {
            return Err(CoreError::NotFound(user_id));
        }

        info!(user_id = %user_id, "User deactivated");
        Ok(())
    }

    /// Extends the trial window by `days`
    ///
    /// # Arguments
    ///
    /// * `user_id` - Target user
    /// * `days` - Between 1 and 365 inclusive
    ///
    /// # Returns
    ///
    /// The new `trial_ends_at`, see [`extended_trial_end`]
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidRange`] if `days` is out of bounds
    /// - [`CoreError::NotFound`] if the user does not exist
    pub async fn extend_trial(&self, user_id: Uuid, days: i64) -> CoreResult<DateTime<Utc>> {
        if !(MIN_TRIAL_EXTENSION_DAYS..=MAX_TRIAL_EXTENSION_DAYS).contains(&days) {
            return Err(CoreError::InvalidRange {
                min: MIN_TRIAL_EXTENSION_DAYS,
                max: MAX_TRIAL_EXTENSION_DAYS,
                actual: days,
            });
        }

        let user = self.get_user(user_id).await?;
        let trial_ends_at = extended_trial_end(user.trial_ends_at, self.clock.now(), days);

        if !self.users.set_trial_ends_at(user_id, trial_ends_at).await? {
            return Err(CoreError::NotFound(user_id));
        }

        info!(user_id = %user_id, days, trial_ends_at = %trial_ends_at, "Trial extended");
        Ok(trial_ends_at)
    }

    fn ensure_token_live(&self, user: &User) -> CoreResult<()> {
        match user.verification_expires_at {
            Some(expires_at) if self.clock.now() <= expires_at => Ok(()),
            _ => {
                warn!(user_id = %user.id, "Token presented after expiry");
                Err(CoreError::TokenExpired)
            }
        }
    }
}
