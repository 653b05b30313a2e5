//! Component wiring
//!
//! Builds every core component over one storage handle, one clock and one
//! delivery channel. Nothing here is global; the HTTP layer keeps a
//! [`Services`] in its router state and tests build their own.

use std::sync::Arc;

use crate::auth::TokenDelivery;
use crate::clock::Clock;
use crate::config::PolicyConfig;
use crate::directory::UserDirectory;
use crate::feedback::FeedbackInbox;
use crate::flow::AuthFlow;
use crate::ledger::UsageLedger;
use crate::quota::{QuotaPolicy, WeekZone};
use crate::sessions::SessionStore;
use crate::store::{
    FeedbackRepository, HealthCheck, SessionRepository, Store, UsageRepository, UserRepository,
};

/// The assembled core
#[derive(Clone)]
pub struct Services {
    pub flow: AuthFlow,
    pub directory: UserDirectory,
    pub sessions: SessionStore,
    pub ledger: UsageLedger,
    pub quota: QuotaPolicy,
    pub feedback: FeedbackInbox,
    pub health: Arc<dyn HealthCheck>,
    pub policy: PolicyConfig,
}

impl Services {
    /// Wires the components
    ///
    /// # Arguments
    ///
    /// * `store` - Storage handle shared by every component
    /// * `clock` - Time source for expiry and quota windows
    /// * `delivery` - Channel that receives issued verification and login tokens
    /// * `policy` - Trial length and weekly document limit
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use snowlion_shared::auth::LogDelivery;
    /// use snowlion_shared::clock::SystemClock;
    /// use snowlion_shared::config::PolicyConfig;
    /// use snowlion_shared::store::MemoryStore;
    /// use snowlion_shared::Services;
    ///
    /// let services = Services::new(
    ///     MemoryStore::arc(),
    ///     Arc::new(SystemClock),
    ///     Arc::new(LogDelivery),
    ///     PolicyConfig::default(),
    /// );
    /// assert_eq!(services.quota.weekly_limit(), 10);
    /// ```
    pub fn new<S>(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        delivery: Arc<dyn TokenDelivery>,
        policy: PolicyConfig,
    ) -> Self
    where
        S: Store + 'static,
    {
        let users: Arc<dyn UserRepository> = store.clone();
        let session_rows: Arc<dyn SessionRepository> = store.clone();
        let usage: Arc<dyn UsageRepository> = store.clone();
        let feedback_rows: Arc<dyn FeedbackRepository> = store.clone();
        let health: Arc<dyn HealthCheck> = store;

        let directory = UserDirectory::new(users, clock.clone(), policy);
        let sessions = SessionStore::new(session_rows, clock.clone());
        let ledger = UsageLedger::new(usage.clone(), clock.clone());
        let quota = QuotaPolicy::new(usage, clock.clone(), policy.weekly_document_limit);
        let feedback = FeedbackInbox::new(feedback_rows, clock.clone());

        let flow = AuthFlow::new(
            directory.clone(),
            sessions.clone(),
            ledger.clone(),
            delivery,
            clock,
        );

        Self {
            flow,
            directory,
            sessions,
            ledger,
            quota,
            feedback,
            health,
            policy,
        }
    }

    /// Overrides the time zone in which quota weeks begin
    pub fn with_week_zone(mut self, zone: WeekZone) -> Self {
        self.quota = self.quota.with_zone(zone);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{OutboxDelivery, TokenPurpose};
    use crate::clock::ManualClock;
    use crate::directory::CreateUser;
    use crate::error::CoreError;
    use crate::ledger::UsageDetails;
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_signup_to_quota_exhaustion() {
        let store = MemoryStore::arc();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 11, 10, 0, 0).unwrap(),
        ));
        let outbox = Arc::new(OutboxDelivery::new());
        let policy = PolicyConfig {
            trial_duration_days: 14,
            weekly_document_limit: 2,
        };
        let services = Services::new(store.clone(), clock, outbox.clone(), policy)
            .with_week_zone(WeekZone::utc());

        services.flow.signup(CreateUser::new("a@b.com")).await.unwrap();
        let verify = outbox
            .latest("a@b.com", TokenPurpose::EmailVerification)
            .await
            .unwrap();
        services.flow.verify_email(&verify).await.unwrap();
        services.flow.request_login("a@b.com").await.unwrap();
        let login = outbox.latest("a@b.com", TokenPurpose::Login).await.unwrap();
        let session = services.flow.complete_login(&login).await.unwrap();

        let user = services.flow.authenticate(Some(&session.token)).await.unwrap();
        assert_eq!(user.email, "a@b.com");

        for _ in 0..2 {
            services
                .quota
                .charge_document(user.user_id, UsageDetails::default())
                .await
                .unwrap();
        }
        assert!(!services.quota.can_process(user.user_id).await.unwrap());

        let before = store.usage_count().await;
        let err = services
            .quota
            .charge_document(user.user_id, UsageDetails::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::QuotaExceeded { .. }));
        assert_eq!(store.usage_count().await, before);

        services.health.ping().await.unwrap();
    }
}
