//! Out-of-band token delivery
//!
//! The core never sends mail itself. After issuing a verification or login
//! token it hands the token to a [`TokenDelivery`] implementation, which owns
//! transport, retries and templating. Delivery failures are the
//! implementation's concern and never roll back the issued token.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;

/// What the delivered token unlocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    /// Confirms ownership of the signup email
    EmailVerification,
    /// Single-use magic login link
    Login,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::EmailVerification => "email_verification",
            TokenPurpose::Login => "login",
        }
    }

    /// Path of the API endpoint that consumes this token
    pub fn link_path(&self, token: &str) -> String {
        match self {
            TokenPurpose::EmailVerification => format!("/api/auth/verify?token={}", token),
            TokenPurpose::Login => format!("/api/auth/login/complete?token={}", token),
        }
    }
}

/// Sink for freshly issued tokens
#[async_trait]
pub trait TokenDelivery: Send + Sync {
    async fn deliver(&self, email: &str, token: &str, purpose: TokenPurpose);
}

/// Writes links to the tracing log instead of sending mail
///
/// Default sink for development deployments. The link is emitted at DEBUG so
/// production log levels do not leak live tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDelivery;

#[async_trait]
impl TokenDelivery for LogDelivery {
    async fn deliver(&self, email: &str, token: &str, purpose: TokenPurpose) {
        tracing::info!(email = %email, purpose = purpose.as_str(), "Token issued for delivery");
        tracing::debug!(
            email = %email,
            link = %purpose.link_path(token),
            "Delivery link"
        );
    }
}

/// A token captured by [`OutboxDelivery`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredToken {
    pub email: String,
    pub token: String,
    pub purpose: TokenPurpose,
}

/// Keeps every delivered token in memory
///
/// Used by tests to pick up tokens the way a user would read them from their
/// inbox.
#[derive(Debug, Default)]
pub struct OutboxDelivery {
    sent: Mutex<Vec<DeliveredToken>>,
}

impl OutboxDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent token sent to `email` for `purpose`
    pub async fn latest(&self, email: &str, purpose: TokenPurpose) -> Option<String> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|d| d.purpose == purpose && d.email.eq_ignore_ascii_case(email))
            .map(|d| d.token.clone())
    }

    pub async fn count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl TokenDelivery for OutboxDelivery {
    async fn deliver(&self, email: &str, token: &str, purpose: TokenPurpose) {
        self.sent.lock().await.push(DeliveredToken {
            email: email.to_string(),
            token: token.to_string(),
            purpose,
        });
    }
}
