//! Product feedback model
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE feedback (
//!     id UUID PRIMARY KEY,
//!     user_id UUID REFERENCES users(id),
//!     document_types TEXT,
//!     process_ideas TEXT,
//!     general_notes TEXT,
//!     rating SMALLINT CHECK (rating BETWEEN 1 AND 5),
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Feedback row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Feedback {
    pub id: Uuid,

    /// `None` for anonymous submissions
    pub user_id: Option<Uuid>,

    /// Document types the user would like interpreted
    pub document_types: Option<String>,

    /// Processes the user thinks could be automated
    pub process_ideas: Option<String>,

    pub general_notes: Option<String>,

    /// Usefulness, 1 to 5
    pub rating: Option<i16>,

    pub created_at: DateTime<Utc>,
}

/// Input for inserting a feedback row
#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub document_types: Option<String>,
    pub process_ideas: Option<String>,
    pub general_notes: Option<String>,
    pub rating: Option<i16>,
    pub created_at: DateTime<Utc>,
}

impl NewFeedback {
    pub fn into_feedback(self) -> Feedback {
        Feedback {
            id: self.id,
            user_id: self.user_id,
            document_types: self.document_types,
            process_ideas: self.process_ideas,
            general_notes: self.general_notes,
            rating: self.rating,
            created_at: self.created_at,
        }
    }
}
