//! Postgres-backed store.
//!
//! Every method is a single statement, so conditional updates (token
//! consumption, deactivation) are atomic without explicit transactions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    FeedbackRepository, HealthCheck, SessionRepository, StoreError, UsageRepository,
    UserRepository,
};
use crate::models::{
    Feedback, NewFeedback, NewSession, NewUsageEntry, NewUser, Session, SessionUser,
    UsageLogEntry, User,
};

const USER_COLUMNS: &str = "id, email, company_name, industry, company_size, trial_ends_at, \
     verification_token, verification_expires_at, email_verified, is_active, created_at";

/// Store over a Postgres connection pool
///
/// # Example
///
/// ```no_run
/// use snowlion_shared::db::pool::{create_pool, DatabaseConfig};
/// use snowlion_shared::store::PgStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// let store = PgStore::new(pool);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let query = format!(
            r#"
            INSERT INTO users (id, email, company_name, industry, company_size, trial_ends_at,
                               verification_token, verification_expires_at, created_at)
            VALUES ($1, LOWER($2), $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(user.id)
            .bind(user.email)
            .bind(user.company_name)
            .bind(user.industry.map(|i| i.as_str()))
            .bind(user.company_size)
            .bind(user.trial_ends_at)
            .bind(user.verification_token)
            .bind(user.verification_expires_at)
            .bind(user.created_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let query = format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_user_by_token(
        &self,
        token: &str,
        email_verified: bool,
    ) -> Result<Option<User>, StoreError> {
        let query = format!(
            "SELECT {} FROM users WHERE verification_token = $1 AND email_verified = $2",
            USER_COLUMNS
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(token)
            .bind(email_verified)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn set_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET verification_token = $2, verification_expires_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_token(
        &self,
        id: Uuid,
        token: &str,
        mark_verified: bool,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET verification_token = NULL,
                verification_expires_at = NULL,
                email_verified = email_verified OR $3
            WHERE id = $1 AND verification_token = $2
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(mark_verified)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_trial_ends_at(&self, id: Uuid, ends_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE users SET trial_ends_at = $2 WHERE id = $1")
            .bind(id)
            .bind(ends_at)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn deactivate_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE users SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SessionRepository for PgStore {
    async fn insert_session(&self, session: NewSession) -> Result<Session, StoreError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, token_hash, expires_at, created_at
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.token_hash)
        .bind(session.expires_at)
        .bind(session.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<SessionUser>, StoreError> {
        let row = sqlx::query_as::<_, SessionUser>(
            r#"
            SELECT s.id AS session_id, s.expires_at, u.id AS user_id, u.email,
                   u.company_name, u.industry, u.trial_ends_at, u.email_verified, u.is_active
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn delete_session(&self, token_hash: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl UsageRepository for PgStore {
    async fn insert_usage(&self, entry: NewUsageEntry) -> Result<UsageLogEntry, StoreError> {
        let entry = sqlx::query_as::<_, UsageLogEntry>(
            r#"
            INSERT INTO usage_logs (id, user_id, action, tokens_used, document_name, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, action, tokens_used, document_name, created_at
            "#,
        )
        .bind(entry.id)
        .bind(entry.user_id)
        .bind(entry.action)
        .bind(entry.tokens_used)
        .bind(entry.document_name)
        .bind(entry.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn list_usage(&self, user_id: Uuid, limit: i64) -> Result<Vec<UsageLogEntry>, StoreError> {
        let entries = sqlx::query_as::<_, UsageLogEntry>(
            r#"
            SELECT id, user_id, action, tokens_used, document_name, created_at
            FROM usage_logs
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn count_usage(
        &self,
        user_id: Uuid,
        action: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM usage_logs
            WHERE user_id = $1
              AND action = $2
              AND ($3::TIMESTAMPTZ IS NULL OR created_at >= $3)
            "#,
        )
        .bind(user_id)
        .bind(action)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn sum_tokens(&self, user_id: Uuid) -> Result<i64, StoreError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(tokens_used), 0)::BIGINT FROM usage_logs WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}

#[async_trait]
impl FeedbackRepository for PgStore {
    async fn insert_feedback(&self, feedback: NewFeedback) -> Result<Feedback, StoreError> {
        let feedback = sqlx::query_as::<_, Feedback>(
            r#"
            INSERT INTO feedback (id, user_id, document_types, process_ideas, general_notes,
                                  rating, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, document_types, process_ideas, general_notes, rating, created_at
            "#,
        )
        .bind(feedback.id)
        .bind(feedback.user_id)
        .bind(feedback.document_types)
        .bind(feedback.process_ideas)
        .bind(feedback.general_notes)
        .bind(feedback.rating)
        .bind(feedback.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(feedback)
    }

    async fn list_feedback(&self, user_id: Uuid) -> Result<Vec<Feedback>, StoreError> {
        let feedback = sqlx::query_as::<_, Feedback>(
            r#"
            SELECT id, user_id, document_types, process_ideas, general_notes, rating, created_at
            FROM feedback
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(feedback)
    }
}

#[async_trait]
impl HealthCheck for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        crate::db::pool::health_check(&self.pool).await?;
        Ok(())
    }
}
