//! Product feedback
//!
//! Trial users (and anonymous visitors) can tell us which document types and
//! processes they want automated next, leave free-form notes and rate the
//! tool. A submission needs at least one non-blank field; blank text fields
//! are stored as absent.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::models::{Feedback, NewFeedback};
use crate::store::FeedbackRepository;

/// Lowest accepted rating
pub const MIN_RATING: i64 = 1;

/// Highest accepted rating
pub const MAX_RATING: i64 = 5;

/// Fields of a submission
#[derive(Debug, Clone, Default)]
pub struct FeedbackInput {
    pub document_types: Option<String>,
    pub process_ideas: Option<String>,
    pub general_notes: Option<String>,
    pub rating: Option<i64>,
}

#[derive(Clone)]
pub struct FeedbackInbox {
    feedback: Arc<dyn FeedbackRepository>,
    clock: Arc<dyn Clock>,
}

impl FeedbackInbox {
    pub fn new(feedback: Arc<dyn FeedbackRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { feedback, clock }
    }

    /// Stores a submission, attributed to `user_id` when the caller is signed in
    ///
    /// # Errors
    ///
    /// - [`CoreError::EmptyFeedback`] if every field is blank or missing
    /// - [`CoreError::InvalidRange`] if the rating is outside 1..=5
    pub async fn submit(&self, user_id: Option<Uuid>, input: FeedbackInput) -> CoreResult<Feedback> {
        let document_types = non_blank(input.document_types);
        let process_ideas = non_blank(input.process_ideas);
        let general_notes = non_blank(input.general_notes);

        if document_types.is_none()
            && process_ideas.is_none()
            && general_notes.is_none()
            && input.rating.is_none()
        {
            return Err(CoreError::EmptyFeedback);
        }

        let rating = input.rating.map(rating_value).transpose()?;

        let feedback = self
            .feedback
            .insert_feedback(NewFeedback {
                id: Uuid::new_v4(),
                user_id,
                document_types,
                process_ideas,
                general_notes,
                rating,
                created_at: self.clock.now(),
            })
            .await?;

        info!(
            feedback_id = %feedback.id,
            user_id = ?feedback.user_id,
            rating = ?feedback.rating,
            "Feedback received"
        );
        Ok(feedback)
    }

    /// The user's own submissions, newest first
    pub async fn list_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Feedback>> {
        Ok(self.feedback.list_feedback(user_id).await?)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn rating_value(rating: i64) -> CoreResult<i16> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(CoreError::InvalidRange {
            min: MIN_RATING,
            max: MAX_RATING,
            actual: rating,
        });
    }
    Ok(rating as i16)
}
