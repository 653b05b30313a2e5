//! User model
//!
//! A trial user is created at signup, verifies ownership of their email, and
//! afterwards logs in through magic links. The single `verification_token`
//! column serves both purposes: it holds the 24-hour verification token until
//! the email is verified, then each 15-minute login token in turn.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE users (
//!     id UUID PRIMARY KEY,
//!     email VARCHAR(320) NOT NULL,
//!     company_name VARCHAR(255),
//!     industry VARCHAR(32),
//!     company_size VARCHAR(64),
//!     trial_ends_at TIMESTAMPTZ NOT NULL,
//!     verification_token VARCHAR(128),
//!     verification_expires_at TIMESTAMPTZ,
//!     email_verified BOOLEAN NOT NULL DEFAULT FALSE,
//!     is_active BOOLEAN NOT NULL DEFAULT TRUE,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! CREATE UNIQUE INDEX users_email_key ON users (LOWER(email));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Industry a trial company operates in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Industry {
    Energy,
    Defence,
    Shipbuilding,
    Datacenter,
    Other,
}

impl Industry {
    /// Every accepted industry, in display order
    pub const ALL: [Industry; 5] = [
        Industry::Energy,
        Industry::Defence,
        Industry::Shipbuilding,
        Industry::Datacenter,
        Industry::Other,
    ];

    /// Converts industry to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Industry::Energy => "energy",
            Industry::Defence => "defence",
            Industry::Shipbuilding => "shipbuilding",
            Industry::Datacenter => "datacenter",
            Industry::Other => "other",
        }
    }

    /// Parses industry from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "energy" => Some(Industry::Energy),
            "defence" => Some(Industry::Defence),
            "shipbuilding" => Some(Industry::Shipbuilding),
            "datacenter" => Some(Industry::Datacenter),
            "other" => Some(Industry::Other),
            _ => None,
        }
    }
}

/// Trial user
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID (UUID v4)
    pub id: Uuid,

    /// Lower-cased email address
    pub email: String,

    pub company_name: Option<String>,

    /// Stored as text, see [`User::get_industry`]
    pub industry: Option<String>,

    pub company_size: Option<String>,

    /// End of the trial window
    pub trial_ends_at: DateTime<Utc>,

    /// Pending verification or login token
    #[serde(skip_serializing)]
    pub verification_token: Option<String>,

    /// Expiry of `verification_token`; set exactly when the token is set
    #[serde(skip_serializing)]
    pub verification_expires_at: Option<DateTime<Utc>>,

    pub email_verified: bool,

    /// False once an administrator deactivates the account
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

impl User {
    /// Gets the parsed industry enum
    pub fn get_industry(&self) -> Option<Industry> {
        self.industry.as_deref().and_then(Industry::from_str)
    }

    /// Whether the trial window has closed at `now`
    pub fn trial_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.trial_ends_at <= now
    }
}

/// Input for inserting a new user row
///
/// Built by [`crate::directory::UserDirectory::create_user`], which stamps the
/// timestamps and the first verification token.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub company_name: Option<String>,
    pub industry: Option<Industry>,
    pub company_size: Option<String>,
    pub trial_ends_at: DateTime<Utc>,
    pub verification_token: String,
    pub verification_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl NewUser {
    /// Converts the payload into the row it will become
    pub fn into_user(self) -> User {
        User {
            id: self.id,
            email: self.email,
            company_name: self.company_name,
            industry: self.industry.map(|i| i.as_str().to_string()),
            company_size: self.company_size,
            trial_ends_at: self.trial_ends_at,
            verification_token: Some(self.verification_token),
            verification_expires_at: Some(self.verification_expires_at),
            email_verified: false,
            is_active: true,
            created_at: self.created_at,
        }
    }
}
