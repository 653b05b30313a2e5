//! Usage ledger model
//!
//! Append-only record of what a user did. Entries are never updated or
//! deleted; weekly quota and usage statistics are derived from them.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE usage_logs (
//!     id UUID PRIMARY KEY,
//!     user_id UUID NOT NULL REFERENCES users(id),
//!     action VARCHAR(64) NOT NULL,
//!     tokens_used BIGINT NOT NULL DEFAULT 0 CHECK (tokens_used >= 0),
//!     document_name VARCHAR(512),
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Well-known action tags
///
/// The `action` column is free-form; these are the values the service itself
/// writes.
pub mod actions {
    /// Successful magic-link login
    pub const LOGIN: &str = "login";

    /// Document received for processing
    pub const DOCUMENT_UPLOAD: &str = "document_upload";

    /// Bill of materials produced; counts against the weekly quota
    pub const BOM_GENERATED: &str = "bom_generated";
}

/// Ledger entry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UsageLogEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: String,
    pub tokens_used: i64,
    pub document_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for appending a ledger entry
#[derive(Debug, Clone)]
pub struct NewUsageEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: String,
    pub tokens_used: i64,
    pub document_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewUsageEntry {
    pub fn into_entry(self) -> UsageLogEntry {
        UsageLogEntry {
            id: self.id,
            user_id: self.user_id,
            action: self.action,
            tokens_used: self.tokens_used,
            document_name: self.document_name,
            created_at: self.created_at,
        }
    }
}

/// Per-user usage summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    /// All-time "bom_generated" entries
    pub total_documents: i64,

    /// "bom_generated" entries since the start of the current week
    pub weekly_documents: i64,

    pub weekly_limit: u32,

    pub remaining_this_week: u32,

    /// Sum of `tokens_used` over every entry
    pub total_tokens_used: i64,
}
