//! Authentication flow
//!
//! Composes the directory, the session store and the ledger into the
//! user-facing lifecycle:
//!
//! ```text
//! signup ──► verify_email ──► request_login ──► complete_login ──► session
//!   │                              │                  │
//!   └── verification token         └── login token    └── "login" ledger entry
//!       delivered out of band          delivered          appended
//! ```
//!
//! Every authenticated request passes through [`AuthFlow::authenticate`],
//! which rejects missing sessions, unverified emails and lapsed trials.

use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::{TokenDelivery, TokenPurpose};
use crate::clock::Clock;
use crate::directory::{CreateUser, LoginToken, UserDirectory};
use crate::error::{CoreError, CoreResult};
use crate::ledger::{UsageDetails, UsageLedger};
use crate::models::{actions, SessionUser, User};
use crate::sessions::{IssuedSession, SessionStore};

#[derive(Clone)]
pub struct AuthFlow {
    directory: UserDirectory,
    sessions: SessionStore,
    ledger: UsageLedger,
    delivery: Arc<dyn TokenDelivery>,
    clock: Arc<dyn Clock>,
}

impl AuthFlow {
    pub fn new(
        directory: UserDirectory,
        sessions: SessionStore,
        ledger: UsageLedger,
        delivery: Arc<dyn TokenDelivery>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory,
            sessions,
            ledger,
            delivery,
            clock,
        }
    }

    /// Registers a trial user and sends the verification token
    ///
    /// The returned user still carries its verification token.
    ///
    /// # Errors
    ///
    /// - [`CoreError::DuplicateEmail`] if the email is taken
    pub async fn signup(&self, input: CreateUser) -> CoreResult<User> {
        let user = self.directory.create_user(input).await?;

        if let Some(token) = user.verification_token.as_deref() {
            self.delivery
                .deliver(&user.email, token, TokenPurpose::EmailVerification)
                .await;
        }

        Ok(user)
    }

    /// Completes email verification; a token works once
    pub async fn verify_email(&self, token: &str) -> CoreResult<User> {
        self.directory.verify_email(token).await
    }

    /// Issues a login token and sends it
    ///
    /// Invalidates any outstanding verification or login token of the user.
    ///
    /// # Errors
    ///
    /// - [`CoreError::UserNotFound`] if no active user has this email
    /// - [`CoreError::EmailNotVerified`] if the email is unverified
    pub async fn request_login(&self, email: &str) -> CoreResult<LoginToken> {
        let login = self.directory.request_login_token(email).await?;

        self.delivery
            .deliver(&login.email, &login.token, TokenPurpose::Login)
            .await;

        Ok(login)
    }

    /// Exchanges a login token for a session
    ///
    /// No session is created when the token is unknown, already used or
    /// expired. A successful login is recorded in the ledger.
    pub async fn complete_login(&self, token: &str) -> CoreResult<IssuedSession> {
        let user_id = self.directory.consume_login_token(token).await?;
        let session = self.sessions.create(user_id).await?;

        self.ledger
            .append(user_id, actions::LOGIN, UsageDetails::default())
            .await?;

        info!(user_id = %user_id, "User logged in");
        Ok(session)
    }

    /// Ends a session; succeeds whether or not it existed
    pub async fn logout(&self, token: &str) -> CoreResult<()> {
        self.sessions.delete(token).await
    }

    /// Request gate for authenticated endpoints
    ///
    /// # Errors
    ///
    /// - [`CoreError::Unauthenticated`] if no token is given or no live session matches
    /// - [`CoreError::EmailNotVerified`] if the user has not verified their email
    /// - [`CoreError::TrialExpired`] if the trial window has closed
    pub async fn authenticate(&self, token: Option<&str>) -> CoreResult<SessionUser> {
        let token = token.ok_or(CoreError::Unauthenticated)?;

        let session = self
            .sessions
            .validate(token)
            .await?
            .ok_or(CoreError::Unauthenticated)?;

        if !session.email_verified {
            return Err(CoreError::EmailNotVerified);
        }

        if session.trial_ends_at <= self.clock.now() {
            debug!(user_id = %session.user_id, "Request rejected, trial expired");
            return Err(CoreError::TrialExpired {
                trial_ends_at: session.trial_ends_at,
            });
        }

        Ok(session)
    }

    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::OutboxDelivery;
    use crate::clock::ManualClock;
    use crate::config::PolicyConfig;
    use crate::store::{MemoryStore, UsageRepository};
    use chrono::{Duration, Utc};

    struct Harness {
        flow: AuthFlow,
        store: Arc<MemoryStore>,
        outbox: Arc<OutboxDelivery>,
        clock: Arc<ManualClock>,
    }

    fn harness() -> Harness {
        let store = MemoryStore::arc();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let outbox = Arc::new(OutboxDelivery::new());

        let flow = AuthFlow::new(
            UserDirectory::new(store.clone(), clock.clone(), PolicyConfig::default()),
            SessionStore::new(store.clone(), clock.clone()),
            UsageLedger::new(store.clone(), clock.clone()),
            outbox.clone(),
            clock.clone(),
        );

        Harness {
            flow,
            store,
            outbox,
            clock,
        }
    }

    async fn logged_in(h: &Harness, email: &str) -> IssuedSession {
        h.flow.signup(CreateUser::new(email)).await.unwrap();
        let verify = h
            .outbox
            .latest(email, TokenPurpose::EmailVerification)
            .await
            .unwrap();
        h.flow.verify_email(&verify).await.unwrap();

        h.flow.request_login(email).await.unwrap();
        let login = h.outbox.latest(email, TokenPurpose::Login).await.unwrap();
        h.flow.complete_login(&login).await.unwrap()
    }

    #[tokio::test]
    async fn test_full_login_cycle() {
        let h = harness();
        let session = logged_in(&h, "a@b.com").await;

        let found = h.flow.sessions().validate(&session.token).await.unwrap().unwrap();
        assert_eq!(found.email, "a@b.com");

        let user = h.flow.authenticate(Some(&session.token)).await.unwrap();
        assert_eq!(user.user_id, session.user_id);

        let logins = h
            .store
            .count_usage(session.user_id, actions::LOGIN, None)
            .await
            .unwrap();
        assert_eq!(logins, 1);
    }

    #[tokio::test]
    async fn test_signup_delivers_verification_token() {
        let h = harness();
        let user = h.flow.signup(CreateUser::new("Ops@B.com")).await.unwrap();

        let delivered = h
            .outbox
            .latest("ops@b.com", TokenPurpose::EmailVerification)
            .await;
        assert_eq!(delivered, user.verification_token);
    }

    #[tokio::test]
    async fn test_request_login_unverified_sends_nothing() {
        let h = harness();
        h.flow.signup(CreateUser::new("a@b.com")).await.unwrap();

        let err = h.flow.request_login("a@b.com").await.unwrap_err();
        assert!(matches!(err, CoreError::EmailNotVerified));
        assert_eq!(h.outbox.count().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_login_creates_no_session() {
        let h = harness();
        h.flow.signup(CreateUser::new("a@b.com")).await.unwrap();
        let verify = h
            .outbox
            .latest("a@b.com", TokenPurpose::EmailVerification)
            .await
            .unwrap();
        h.flow.verify_email(&verify).await.unwrap();
        h.flow.request_login("a@b.com").await.unwrap();
        let login = h.outbox.latest("a@b.com", TokenPurpose::Login).await.unwrap();

        assert!(matches!(
            h.flow.complete_login("not-a-token").await.unwrap_err(),
            CoreError::InvalidToken
        ));

        h.clock.advance(Duration::minutes(16));
        assert!(matches!(
            h.flow.complete_login(&login).await.unwrap_err(),
            CoreError::TokenExpired
        ));

        assert_eq!(h.store.session_count().await, 0);
        assert_eq!(h.store.usage_count().await, 0);
    }

    #[tokio::test]
    async fn test_authenticate_gates() {
        let h = harness();

        assert!(matches!(
            h.flow.authenticate(None).await.unwrap_err(),
            CoreError::Unauthenticated
        ));
        assert!(matches!(
            h.flow.authenticate(Some("missing")).await.unwrap_err(),
            CoreError::Unauthenticated
        ));

        let session = logged_in(&h, "a@b.com").await;
        h.clock.advance(Duration::days(6));
        h.flow.authenticate(Some(&session.token)).await.unwrap();

        h.clock.advance(Duration::days(2));
        assert!(matches!(
            h.flow.authenticate(Some(&session.token)).await.unwrap_err(),
            CoreError::Unauthenticated
        ));

        // Day 8: a fresh session outlives the 14-day trial
        let fresh = logged_in_again(&h, "a@b.com").await;
        h.clock.advance(Duration::days(6));
        assert!(matches!(
            h.flow.authenticate(Some(&fresh.token)).await.unwrap_err(),
            CoreError::TrialExpired { .. }
        ));
    }

    async fn logged_in_again(h: &Harness, email: &str) -> IssuedSession {
        h.flow.request_login(email).await.unwrap();
        let login = h.outbox.latest(email, TokenPurpose::Login).await.unwrap();
        h.flow.complete_login(&login).await.unwrap()
    }

    #[tokio::test]
    async fn test_unverified_session_is_rejected() {
        let h = harness();
        let user = h.flow.signup(CreateUser::new("a@b.com")).await.unwrap();
        let session = h.flow.sessions().create(user.id).await.unwrap();

        assert!(matches!(
            h.flow.authenticate(Some(&session.token)).await.unwrap_err(),
            CoreError::EmailNotVerified
        ));
    }

    #[tokio::test]
    async fn test_deactivation_kills_live_session() {
        let h = harness();
        let session = logged_in(&h, "a@b.com").await;

        h.flow.directory().deactivate(session.user_id).await.unwrap();
        assert!(h.flow.sessions().validate(&session.token).await.unwrap().is_none());
        assert!(matches!(
            h.flow.authenticate(Some(&session.token)).await.unwrap_err(),
            CoreError::Unauthenticated
        ));
    }

    #[tokio::test]
    async fn test_logout_always_succeeds() {
        let h = harness();
        let session = logged_in(&h, "a@b.com").await;

        h.flow.logout(&session.token).await.unwrap();
        h.flow.logout(&session.token).await.unwrap();
        assert!(matches!(
            h.flow.authenticate(Some(&session.token)).await.unwrap_err(),
            CoreError::Unauthenticated
        ));
    }
}
