//! Process-wide trial and quota policy
//!
//! Both values are read once at startup and never change while the process
//! runs. Components receive the policy at construction.
//!
//! # Environment Variables
//!
//! - `TRIAL_DURATION_DAYS`: Length of the trial window, 1..=3650 (default: 14)
//! - `WEEKLY_DOCUMENT_LIMIT`: Documents a user may process per calendar week (default: 10)
//!
//! # Example
//!
//! ```
//! use snowlion_shared::config::PolicyConfig;
//!
//! let policy = PolicyConfig::default();
//! assert_eq!(policy.trial_duration_days, 14);
//! assert_eq!(policy.weekly_document_limit, 10);
//! ```

use serde::{Deserialize, Serialize};
use std::env;

/// Default trial length in days
pub const DEFAULT_TRIAL_DURATION_DAYS: i64 = 14;

/// Shortest configurable trial
pub const MIN_TRIAL_DURATION_DAYS: i64 = 1;

/// Longest configurable trial
pub const MAX_TRIAL_DURATION_DAYS: i64 = 3650;

/// Default weekly document limit
pub const DEFAULT_WEEKLY_DOCUMENT_LIMIT: u32 = 10;

/// Trial and quota settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Days between signup and the end of the trial window
    pub trial_duration_days: i64,

    /// Maximum "bom_generated" entries per user per calendar week
    pub weekly_document_limit: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            trial_duration_days: DEFAULT_TRIAL_DURATION_DAYS,
            weekly_document_limit: DEFAULT_WEEKLY_DOCUMENT_LIMIT,
        }
    }
}

impl PolicyConfig {
    /// Loads the policy from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is not a number or the trial length is
    /// outside 1..=3650 days.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads the policy from an arbitrary variable source
    ///
    /// Unset variables fall back to the defaults; set but unparsable values are
    /// rejected.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let trial_duration_days = match lookup("TRIAL_DURATION_DAYS") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|e| anyhow::anyhow!("TRIAL_DURATION_DAYS is not a number: {}", e))?,
            None => DEFAULT_TRIAL_DURATION_DAYS,
        };

        let weekly_document_limit = match lookup("WEEKLY_DOCUMENT_LIMIT") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|e| anyhow::anyhow!("WEEKLY_DOCUMENT_LIMIT is not a number: {}", e))?,
            None => DEFAULT_WEEKLY_DOCUMENT_LIMIT,
        };

        let policy = Self {
            trial_duration_days,
            weekly_document_limit,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Checks that the policy values are usable
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(MIN_TRIAL_DURATION_DAYS..=MAX_TRIAL_DURATION_DAYS).contains(&self.trial_duration_days) {
            anyhow::bail!(
                "TRIAL_DURATION_DAYS must be between {} and {}, got {}",
                MIN_TRIAL_DURATION_DAYS,
                MAX_TRIAL_DURATION_DAYS,
                self.trial_duration_days
            );
        }
        Ok(())
    }
}
