//! Usage ledger
//!
//! Append-only log of user actions. Entries are stamped with the server clock
//! and never modified; quota and statistics are computed from them.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::CoreResult;
use crate::models::{NewUsageEntry, UsageLogEntry};
use crate::store::UsageRepository;

/// Default number of history entries returned
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Upper bound on history entries returned
pub const MAX_HISTORY_LIMIT: i64 = 100;

/// Optional fields of a ledger entry
#[derive(Debug, Clone, Default)]
pub struct UsageDetails {
    pub tokens_used: i64,
    pub document_name: Option<String>,
}

#[derive(Clone)]
pub struct UsageLedger {
    usage: Arc<dyn UsageRepository>,
    clock: Arc<dyn Clock>,
}

impl UsageLedger {
    pub fn new(usage: Arc<dyn UsageRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { usage, clock }
    }

    /// Appends an entry unconditionally
    ///
    /// Negative token counts are clamped to zero.
    pub async fn append(
        &self,
        user_id: Uuid,
        action: &str,
        details: UsageDetails,
    ) -> CoreResult<UsageLogEntry> {
        let entry = self
            .usage
            .insert_usage(NewUsageEntry {
                id: Uuid::new_v4(),
                user_id,
                action: action.to_string(),
                tokens_used: details.tokens_used.max(0),
                document_name: details.document_name,
                created_at: self.clock.now(),
            })
            .await?;

        debug!(
            user_id = %user_id,
            action = %entry.action,
            tokens_used = entry.tokens_used,
            "Usage recorded"
        );
        Ok(entry)
    }

    /// Most recent entries first, at most `limit`
    pub async fn history(&self, user_id: Uuid, limit: i64) -> CoreResult<Vec<UsageLogEntry>> {
        Ok(self.usage.list_usage(user_id, limit.max(0)).await?)
    }
}

/// Clamps a requested history size into `1..=MAX_HISTORY_LIMIT`
///
/// # Example
///
/// ```
/// use snowlion_shared::ledger::clamp_history_limit;
///
/// assert_eq!(clamp_history_limit(None), 50);
/// assert_eq!(clamp_history_limit(Some(500)), 100);
/// assert_eq!(clamp_history_limit(Some(0)), 1);
/// ```
pub fn clamp_history_limit(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}
