//! Weekly document quota
//!
//! Each user may generate a fixed number of bills of materials per calendar
//! week. A week starts on Sunday at 00:00 in the server's time zone; the count
//! is the number of `bom_generated` ledger entries created since then, so it
//! resets at that boundary rather than rolling.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use snowlion_shared::clock::SystemClock;
//! use snowlion_shared::quota::QuotaPolicy;
//! use snowlion_shared::store::MemoryStore;
//! use uuid::Uuid;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = QuotaPolicy::new(MemoryStore::arc(), Arc::new(SystemClock), 10);
//!
//! let check = policy.check(Uuid::new_v4()).await?;
//! assert!(check.allowed);
//! assert_eq!(check.remaining, 10);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use chrono::{DateTime, Datelike, Duration, FixedOffset, Local, NaiveTime, Offset, TimeZone, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::ledger::{UsageDetails, UsageLedger};
use crate::models::{actions, UsageLogEntry, UsageStats};
use crate::store::UsageRepository;

/// Time zone that defines where a quota week begins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekZone {
    /// The server's local time zone
    Local,
    /// A fixed UTC offset
    Fixed(FixedOffset),
}

impl WeekZone {
    pub fn utc() -> Self {
        WeekZone::Fixed(Utc.fix())
    }
}

/// Start of the quota week containing `now`
pub fn week_start(now: DateTime<Utc>, zone: WeekZone) -> DateTime<Utc> {
    match zone {
        WeekZone::Local => week_start_in(now, &Local),
        WeekZone::Fixed(offset) => week_start_in(now, &offset),
    }
}

/// Most recent Sunday 00:00 in `tz` at or before `now`
///
/// If local midnight does not exist on that Sunday (a DST gap), the first
/// valid instant after it is used.
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use snowlion_shared::quota::week_start_in;
///
/// // Wednesday
/// let now = Utc.with_ymd_and_hms(2025, 6, 11, 15, 0, 0).unwrap();
/// let start = week_start_in(now, &Utc);
/// assert_eq!(start, Utc.with_ymd_and_hms(2025, 6, 8, 0, 0, 0).unwrap());
/// ```
pub fn week_start_in<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    let local = now.with_timezone(tz);
    let days_back = i64::from(local.weekday().num_days_from_sunday());
    let sunday_midnight = (local.date_naive() - Duration::days(days_back)).and_time(NaiveTime::default());

    tz.from_local_datetime(&sunday_midnight)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(sunday_midnight + Duration::hours(1)))
                .earliest()
        })
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&sunday_midnight))
}

/// Result of a quota check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaCheckResult {
    /// Whether another document may be processed
    pub allowed: bool,

    /// Documents processed this week
    pub current: u32,

    /// Weekly limit
    pub limit: u32,

    /// Documents left this week
    pub remaining: u32,
}

impl QuotaCheckResult {
    pub fn allowed(current: u32, limit: u32) -> Self {
        QuotaCheckResult {
            allowed: true,
            current,
            limit,
            remaining: limit.saturating_sub(current),
        }
    }

    pub fn exceeded(current: u32, limit: u32) -> Self {
        QuotaCheckResult {
            allowed: false,
            current,
            limit,
            remaining: 0,
        }
    }
}

/// One async lock per user with a charge in flight
///
/// Entries nobody holds are pruned on the next acquisition, so the map only
/// grows with the number of users charging concurrently.
#[derive(Debug, Default)]
struct ChargeLocks {
    locks: StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ChargeLocks {
    fn for_user(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|id, lock| *id == user_id || Arc::strong_count(lock) > 1);
        locks.entry(user_id).or_default().clone()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Weekly quota gate over the usage ledger
#[derive(Clone)]
pub struct QuotaPolicy {
    usage: Arc<dyn UsageRepository>,
    ledger: UsageLedger,
    clock: Arc<dyn Clock>,
    weekly_limit: u32,
    zone: WeekZone,
    charge_locks: Arc<ChargeLocks>,
}

impl QuotaPolicy {
    /// Creates a policy whose weeks start at local midnight on Sunday
    pub fn new(usage: Arc<dyn UsageRepository>, clock: Arc<dyn Clock>, weekly_limit: u32) -> Self {
        Self {
            ledger: UsageLedger::new(usage.clone(), clock.clone()),
            usage,
            clock,
            weekly_limit,
            zone: WeekZone::Local,
            charge_locks: Arc::new(ChargeLocks::default()),
        }
    }

    pub fn with_zone(mut self, zone: WeekZone) -> Self {
        self.zone = zone;
        self
    }

    pub fn weekly_limit(&self) -> u32 {
        self.weekly_limit
    }

    /// Start of the current quota week
    pub fn current_week_start(&self) -> DateTime<Utc> {
        week_start(self.clock.now(), self.zone)
    }

    async fn weekly_count(&self, user_id: Uuid) -> CoreResult<u32> {
        let count = self
            .usage
            .count_usage(user_id, actions::BOM_GENERATED, Some(self.current_week_start()))
            .await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Checks the user's standing against the weekly limit
    pub async fn check(&self, user_id: Uuid) -> CoreResult<QuotaCheckResult> {
        let current = self.weekly_count(user_id).await?;

        if current >= self.weekly_limit {
            Ok(QuotaCheckResult::exceeded(current, self.weekly_limit))
        } else {
            Ok(QuotaCheckResult::allowed(current, self.weekly_limit))
        }
    }

    /// Documents left this week, never negative
    pub async fn remaining(&self, user_id: Uuid) -> CoreResult<u32> {
        Ok(self.check(user_id).await?.remaining)
    }

    pub async fn can_process(&self, user_id: Uuid) -> CoreResult<bool> {
        Ok(self.remaining(user_id).await? > 0)
    }

    /// Fails with [`CoreError::QuotaExceeded`] when no documents remain
    pub async fn enforce(&self, user_id: Uuid) -> CoreResult<QuotaCheckResult> {
        let result = self.check(user_id).await?;

        if !result.allowed {
            warn!(
                user_id = %user_id,
                used = result.current,
                limit = result.limit,
                "Weekly document limit reached"
            );
            return Err(CoreError::QuotaExceeded {
                limit: result.limit,
                used: result.current,
            });
        }

        Ok(result)
    }

    /// Gates a document and records it as generated
    ///
    /// Nothing is appended when the quota is exhausted. Within one process,
    /// charges for the same user are serialized so concurrent requests cannot
    /// overshoot the limit together; different users never wait on each other.
    /// Separate processes sharing one database can each admit one document
    /// past the limit in a race.
    ///
    /// # Errors
    ///
    /// - [`CoreError::QuotaExceeded`] if the weekly limit is reached
    pub async fn charge_document(
        &self,
        user_id: Uuid,
        details: UsageDetails,
    ) -> CoreResult<UsageLogEntry> {
        let lock = self.charge_locks.for_user(user_id);
        let _guard = lock.lock().await;

        let before = self.enforce(user_id).await?;
        let entry = self
            .ledger
            .append(user_id, actions::BOM_GENERATED, details)
            .await?;

        info!(
            user_id = %user_id,
            remaining = before.remaining.saturating_sub(1),
            "Document charged against weekly quota"
        );
        Ok(entry)
    }

    /// Usage summary for the user
    pub async fn stats(&self, user_id: Uuid) -> CoreResult<UsageStats> {
        let total_documents = self
            .usage
            .count_usage(user_id, actions::BOM_GENERATED, None)
            .await?;
        let check = self.check(user_id).await?;
        let total_tokens_used = self.usage.sum_tokens(user_id).await?;

        Ok(UsageStats {
            total_documents,
            weekly_documents: i64::from(check.current),
            weekly_limit: self.weekly_limit,
            remaining_this_week: check.remaining,
            total_tokens_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::generate_token;
    use crate::clock::ManualClock;
    use crate::models::NewUser;
    use crate::store::{MemoryStore, UserRepository};

    // 2025-06-11 is a Wednesday.
    fn wednesday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 11, 15, 0, 0).unwrap()
    }

    async fn add_user(store: &MemoryStore, email: &str, now: DateTime<Utc>) -> Uuid {
        store
            .insert_user(NewUser {
                id: Uuid::new_v4(),
                email: email.to_string(),
                company_name: None,
                industry: None,
                company_size: None,
                trial_ends_at: now + Duration::days(14),
                verification_token: generate_token(),
                verification_expires_at: now + Duration::hours(24),
                created_at: now,
            })
            .await
            .unwrap()
            .id
    }

    async fn setup_with_store(
        limit: u32,
    ) -> (QuotaPolicy, UsageLedger, Arc<ManualClock>, Arc<MemoryStore>, Uuid) {
        let store = MemoryStore::arc();
        let clock = Arc::new(ManualClock::new(wednesday()));
        let user_id = add_user(&store, "a@b.com", clock.now()).await;

        let policy = QuotaPolicy::new(store.clone(), clock.clone(), limit).with_zone(WeekZone::utc());
        let ledger = UsageLedger::new(store.clone(), clock.clone());
        (policy, ledger, clock, store, user_id)
    }

    async fn setup(limit: u32) -> (QuotaPolicy, UsageLedger, Arc<ManualClock>, Uuid) {
        let (policy, ledger, clock, _, user_id) = setup_with_store(limit).await;
        (policy, ledger, clock, user_id)
    }

    #[test]
    fn test_week_start_sunday_is_its_own_start() {
        let sunday_noon = Utc.with_ymd_and_hms(2025, 6, 8, 12, 0, 0).unwrap();
        assert_eq!(
            week_start_in(sunday_noon, &Utc),
            Utc.with_ymd_and_hms(2025, 6, 8, 0, 0, 0).unwrap()
        );

        let saturday_late = Utc.with_ymd_and_hms(2025, 6, 14, 23, 59, 59).unwrap();
        assert_eq!(
            week_start_in(saturday_late, &Utc),
            Utc.with_ymd_and_hms(2025, 6, 8, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_week_start_respects_offset() {
        // Sunday 01:00 at UTC+3 is Saturday 22:00 UTC.
        let plus_three = FixedOffset::east_opt(3 * 3600).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 7, 22, 0, 0).unwrap();

        assert_eq!(
            week_start_in(now, &plus_three),
            Utc.with_ymd_and_hms(2025, 6, 7, 21, 0, 0).unwrap()
        );
        assert_eq!(
            week_start_in(now, &Utc),
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_quota_check_result() {
        let ok = QuotaCheckResult::allowed(3, 10);
        assert!(ok.allowed);
        assert_eq!(ok.remaining, 7);

        let over = QuotaCheckResult::exceeded(12, 10);
        assert!(!over.allowed);
        assert_eq!(over.remaining, 0);
    }

    #[tokio::test]
    async fn test_only_bom_generated_counts() {
        let (policy, ledger, _, user_id) = setup(2).await;

        ledger.append(user_id, actions::LOGIN, UsageDetails::default()).await.unwrap();
        ledger
            .append(user_id, actions::DOCUMENT_UPLOAD, UsageDetails::default())
            .await
            .unwrap();
        assert_eq!(policy.remaining(user_id).await.unwrap(), 2);

        ledger
            .append(user_id, actions::BOM_GENERATED, UsageDetails::default())
            .await
            .unwrap();
        assert_eq!(policy.remaining(user_id).await.unwrap(), 1);
        assert!(policy.can_process(user_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_limit_reached_rejects_before_append() {
        let (policy, ledger, _, user_id) = setup(2).await;

        policy.charge_document(user_id, UsageDetails::default()).await.unwrap();
        policy.charge_document(user_id, UsageDetails::default()).await.unwrap();
        assert!(!policy.can_process(user_id).await.unwrap());

        let err = policy
            .charge_document(user_id, UsageDetails::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::QuotaExceeded { limit: 2, used: 2 }));
        assert_eq!(ledger.history(user_id, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_charges_for_one_user_respect_limit() {
        let (policy, ledger, _, user_id) = setup(1).await;

        let (a, b) = tokio::join!(
            policy.charge_document(user_id, UsageDetails::default()),
            policy.charge_document(user_id, UsageDetails::default())
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        assert_eq!(ledger.history(user_id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_charge_lock_is_per_user() {
        let (policy, _, clock, store, first) = setup_with_store(5).await;
        let second = add_user(&store, "c@d.com", clock.now()).await;

        let held = policy.charge_locks.for_user(first);
        let _guard = held.lock().await;

        let charged = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            policy.charge_document(second, UsageDetails::default()),
        )
        .await
        .expect("charge for another user must not wait on the held lock");
        assert!(charged.is_ok());
    }

    #[tokio::test]
    async fn test_idle_charge_locks_are_pruned() {
        let (policy, _, clock, store, first) = setup_with_store(5).await;
        let second = add_user(&store, "c@d.com", clock.now()).await;

        policy.charge_document(first, UsageDetails::default()).await.unwrap();
        policy.charge_document(second, UsageDetails::default()).await.unwrap();
        policy.charge_document(first, UsageDetails::default()).await.unwrap();

        assert_eq!(policy.charge_locks.len(), 1);
    }

    #[tokio::test]
    async fn test_week_boundary_resets_count() {
        let (policy, _, clock, user_id) = setup(1).await;

        // Saturday 23:59:59
        clock.set(Utc.with_ymd_and_hms(2025, 6, 14, 23, 59, 59).unwrap());
        policy.charge_document(user_id, UsageDetails::default()).await.unwrap();
        assert!(!policy.can_process(user_id).await.unwrap());

        // Sunday 00:00:00
        clock.set(Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap());
        assert!(policy.can_process(user_id).await.unwrap());
        assert_eq!(policy.remaining(user_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_zero_limit_never_allows() {
        let (policy, _, _, user_id) = setup(0).await;
        assert!(!policy.can_process(user_id).await.unwrap());
        assert_eq!(policy.remaining(user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stats() {
        let (policy, ledger, clock, user_id) = setup(10).await;

        clock.advance(-Duration::days(7));
        policy
            .charge_document(
                user_id,
                UsageDetails {
                    tokens_used: 1000,
                    document_name: Some("doc_1".to_string()),
                },
            )
            .await
            .unwrap();

        clock.set(wednesday());
        policy
            .charge_document(
                user_id,
                UsageDetails {
                    tokens_used: 500,
                    document_name: Some("doc_2".to_string()),
                },
            )
            .await
            .unwrap();
        ledger.append(user_id, actions::LOGIN, UsageDetails::default()).await.unwrap();

        let stats = policy.stats(user_id).await.unwrap();
        assert_eq!(
            stats,
            UsageStats {
                total_documents: 2,
                weekly_documents: 1,
                weekly_limit: 10,
                remaining_this_week: 9,
                total_tokens_used: 1500,
            }
        );
    }
}
