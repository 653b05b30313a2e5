//! In-memory store for tests and local development.
//!
//! A single async mutex guards all tables, so every trait method is
//! atomic in the same way a single SQL statement is. Uniqueness and foreign
//! key rules mirror the Postgres schema.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    FeedbackRepository, HealthCheck, SessionRepository, StoreError, UsageRepository,
    UserRepository, SESSIONS_TOKEN_KEY, USERS_EMAIL_KEY,
};
use crate::models::{
    Feedback, NewFeedback, NewSession, NewUsageEntry, NewUser, Session, SessionUser,
    UsageLogEntry, User,
};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sessions: HashMap<String, Session>,
    usage: Vec<UsageLogEntry>,
    feedback: Vec<Feedback>,
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of stored sessions, live or expired.
    pub async fn session_count(&self) -> usize {
        self.tables.lock().await.sessions.len()
    }

    /// Number of ledger entries across all users.
    pub async fn usage_count(&self) -> usize {
        self.tables.lock().await.usage.len()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.lock().await;

        let mut user = user.into_user();
        user.email = user.email.to_lowercase();

        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation(USERS_EMAIL_KEY.to_string()));
        }

        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.to_lowercase();
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_token(
        &self,
        token: &str,
        email_verified: bool,
    ) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| {
                u.email_verified == email_verified && u.verification_token.as_deref() == Some(token)
            })
            .cloned())
    }

    async fn set_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.users.get_mut(&id) {
            Some(user) => {
                user.verification_token = Some(token.to_string());
                user.verification_expires_at = Some(expires_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear_token(
        &self,
        id: Uuid,
        token: &str,
        mark_verified: bool,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.users.get_mut(&id) {
            Some(user) if user.verification_token.as_deref() == Some(token) => {
                user.verification_token = None;
                user.verification_expires_at = None;
                user.email_verified |= mark_verified;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_trial_ends_at(&self, id: Uuid, ends_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.users.get_mut(&id) {
            Some(user) => {
                user.trial_ends_at = ends_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn deactivate_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.users.get_mut(&id) {
            Some(user) => {
                user.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn insert_session(&self, session: NewSession) -> Result<Session, StoreError> {
        let mut tables = self.tables.lock().await;

        if !tables.users.contains_key(&session.user_id) {
            return Err(StoreError::ForeignKeyViolation(
                "sessions_user_id_fkey".to_string(),
            ));
        }
        if tables.sessions.contains_key(&session.token_hash) {
            return Err(StoreError::UniqueViolation(SESSIONS_TOKEN_KEY.to_string()));
        }

        let session = session.into_session();
        tables
            .sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(session)
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<SessionUser>, StoreError> {
        let tables = self.tables.lock().await;

        let Some(session) = tables.sessions.get(token_hash) else {
            return Ok(None);
        };
        let Some(user) = tables.users.get(&session.user_id) else {
            return Ok(None);
        };

        Ok(Some(SessionUser {
            session_id: session.id,
            expires_at: session.expires_at,
            user_id: user.id,
            email: user.email.clone(),
            company_name: user.company_name.clone(),
            industry: user.industry.clone(),
            trial_ends_at: user.trial_ends_at,
            email_verified: user.email_verified,
            is_active: user.is_active,
        }))
    }

    async fn delete_session(&self, token_hash: &str) -> Result<bool, StoreError> {
        Ok(self.tables.lock().await.sessions.remove(token_hash).is_some())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.expires_at >= now);
        Ok((before - tables.sessions.len()) as u64)
    }
}

#[async_trait]
impl UsageRepository for MemoryStore {
    async fn insert_usage(&self, entry: NewUsageEntry) -> Result<UsageLogEntry, StoreError> {
        let mut tables = self.tables.lock().await;

        if !tables.users.contains_key(&entry.user_id) {
            return Err(StoreError::ForeignKeyViolation(
                "usage_logs_user_id_fkey".to_string(),
            ));
        }

        let entry = entry.into_entry();
        tables.usage.push(entry.clone());
        Ok(entry)
    }

    async fn list_usage(&self, user_id: Uuid, limit: i64) -> Result<Vec<UsageLogEntry>, StoreError> {
        let tables = self.tables.lock().await;

        let mut entries: Vec<UsageLogEntry> = tables
            .usage
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit.max(0) as usize);

        Ok(entries)
    }

    async fn count_usage(
        &self,
        user_id: Uuid,
        action: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64, StoreError> {
        let tables = self.tables.lock().await;
        let count = tables
            .usage
            .iter()
            .filter(|e| e.user_id == user_id && e.action == action)
            .filter(|e| since.map_or(true, |since| e.created_at >= since))
            .count();

        Ok(count as i64)
    }

    async fn sum_tokens(&self, user_id: Uuid) -> Result<i64, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .usage
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.tokens_used)
            .sum())
    }
}

#[async_trait]
impl FeedbackRepository for MemoryStore {
    async fn insert_feedback(&self, feedback: NewFeedback) -> Result<Feedback, StoreError> {
        let mut tables = self.tables.lock().await;

        if let Some(user_id) = feedback.user_id {
            if !tables.users.contains_key(&user_id) {
                return Err(StoreError::ForeignKeyViolation(
                    "feedback_user_id_fkey".to_string(),
                ));
            }
        }

        let feedback = feedback.into_feedback();
        tables.feedback.push(feedback.clone());
        Ok(feedback)
    }

    async fn list_feedback(&self, user_id: Uuid) -> Result<Vec<Feedback>, StoreError> {
        let tables = self.tables.lock().await;

        let mut feedback: Vec<Feedback> = tables
            .feedback
            .iter()
            .rev()
            .filter(|f| f.user_id == Some(user_id))
            .cloned()
            .collect();
        feedback.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(feedback)
    }
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_user(email: &str, now: DateTime<Utc>) -> NewUser {
        NewUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            company_name: None,
            industry: None,
            company_size: None,
            trial_ends_at: now + Duration::days(14),
            verification_token: crate::auth::generate_token(),
            verification_expires_at: now + Duration::hours(24),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_email_unique_case_insensitive() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let user = store.insert_user(new_user("Ops@Example.com", now)).await.unwrap();
        assert_eq!(user.email, "ops@example.com");

        let err = store
            .insert_user(new_user("OPS@example.COM", now))
            .await
            .unwrap_err();
        assert!(err.violates(USERS_EMAIL_KEY));

        let found = store.find_user_by_email("oPs@ExAmPlE.cOm").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_clear_token_is_conditional() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let payload = new_user("a@b.com", now);
        let token = payload.verification_token.clone();
        let user = store.insert_user(payload).await.unwrap();

        assert!(!store.clear_token(user.id, "other", true).await.unwrap());
        assert!(store.clear_token(user.id, &token, true).await.unwrap());
        assert!(!store.clear_token(user.id, &token, true).await.unwrap());

        let user = store.find_user(user.id).await.unwrap().unwrap();
        assert!(user.email_verified);
        assert!(user.verification_token.is_none());
        assert!(user.verification_expires_at.is_none());
    }

    #[tokio::test]
    async fn test_session_requires_user_and_unique_token() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let user = store.insert_user(new_user("a@b.com", now)).await.unwrap();

        let session = |user_id| NewSession {
            id: Uuid::new_v4(),
            user_id,
            token_hash: "tok".to_string(),
            expires_at: now + Duration::days(7),
            created_at: now,
        };

        let err = store.insert_session(session(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation(_)));

        store.insert_session(session(user.id)).await.unwrap();
        let err = store.insert_session(session(user.id)).await.unwrap_err();
        assert!(err.violates(SESSIONS_TOKEN_KEY));
    }

    #[tokio::test]
    async fn test_delete_expired_sessions() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let user = store.insert_user(new_user("a@b.com", now)).await.unwrap();

        for (token, expires_at) in [("old", now - Duration::seconds(1)), ("edge", now), ("new", now + Duration::days(1))] {
            store
                .insert_session(NewSession {
                    id: Uuid::new_v4(),
                    user_id: user.id,
                    token_hash: token.to_string(),
                    expires_at,
                    created_at: now - Duration::days(7),
                })
                .await
                .unwrap();
        }

        assert_eq!(store.delete_expired_sessions(now).await.unwrap(), 1);
        assert_eq!(store.session_count().await, 2);
        assert!(store.find_session("old").await.unwrap().is_none());
        assert!(store.find_session("edge").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_feedback_owner_must_exist() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let user = store.insert_user(new_user("a@b.com", now)).await.unwrap();

        let feedback = |user_id, minutes| NewFeedback {
            id: Uuid::new_v4(),
            user_id,
            document_types: None,
            process_ideas: None,
            general_notes: Some("useful".to_string()),
            rating: Some(4),
            created_at: now + Duration::minutes(minutes),
        };

        let err = store
            .insert_feedback(feedback(Some(Uuid::new_v4()), 0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation(_)));

        store.insert_feedback(feedback(None, 0)).await.unwrap();
        let older = store.insert_feedback(feedback(Some(user.id), 1)).await.unwrap();
        let newer = store.insert_feedback(feedback(Some(user.id), 2)).await.unwrap();

        let mine: Vec<Uuid> = store
            .list_feedback(user.id)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(mine, [newer.id, older.id]);
    }

    #[tokio::test]
    async fn test_usage_queries() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let user = store.insert_user(new_user("a@b.com", now)).await.unwrap();

        for (i, action) in ["login", "bom_generated", "bom_generated"].iter().enumerate() {
            store
                .insert_usage(NewUsageEntry {
                    id: Uuid::new_v4(),
                    user_id: user.id,
                    action: action.to_string(),
                    tokens_used: 100 * i as i64,
                    document_name: None,
                    created_at: now + Duration::minutes(i as i64),
                })
                .await
                .unwrap();
        }

        let history = store.list_usage(user.id, 2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].created_at > history[1].created_at);

        assert_eq!(store.count_usage(user.id, "bom_generated", None).await.unwrap(), 2);
        assert_eq!(
            store
                .count_usage(user.id, "bom_generated", Some(now + Duration::minutes(2)))
                .await
                .unwrap(),
            1
        );
        assert_eq!(store.sum_tokens(user.id).await.unwrap(), 300);
        assert_eq!(store.sum_tokens(Uuid::new_v4()).await.unwrap(), 0);
    }
}
