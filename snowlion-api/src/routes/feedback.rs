//! Feedback endpoints
//!
//! - `POST /api/feedback` - Submit feedback (signed in or anonymous)
//! - `GET  /api/feedback/prompts` - Questions shown in the feedback form
//! - `GET  /api/feedback/mine` - The caller's own submissions (authenticated)

use crate::{app::AppState, error::ApiResult, middleware::auth::CurrentSession};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use snowlion_shared::{
    feedback::{FeedbackInput, MAX_RATING, MIN_RATING},
    models::Feedback,
};
use uuid::Uuid;
use validator::Validate;

/// Feedback submission; at least one field must be present
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitFeedbackRequest {
    #[validate(length(max = 5000, message = "Must be at most 5000 characters"))]
    pub document_types: Option<String>,

    #[validate(length(max = 5000, message = "Must be at most 5000 characters"))]
    pub process_ideas: Option<String>,

    #[validate(length(max = 5000, message = "Must be at most 5000 characters"))]
    pub general_notes: Option<String>,

    /// 1 to 5
    pub rating: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitFeedbackResponse {
    pub message: String,
    pub feedback_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedbackPrompt {
    pub field: String,
    pub question: String,
    pub question_en: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptsResponse {
    pub prompts: Vec<FeedbackPrompt>,
}

#[derive(Debug, Serialize)]
pub struct MyFeedbackResponse {
    pub feedback: Vec<Feedback>,
}

/// Submit feedback
///
/// ```text
/// POST /api/feedback
/// Authorization: Bearer <token>   (optional)
///
/// { "document_types": "Datasheets", "rating": 4 }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: every field blank, rating outside 1..=5, or a field too long
pub async fn submit(
    State(state): State<AppState>,
    current: Option<Extension<CurrentSession>>,
    Json(req): Json<SubmitFeedbackRequest>,
) -> ApiResult<(StatusCode, Json<SubmitFeedbackResponse>)> {
    req.validate()?;

    let user_id = current.map(|Extension(session)| session.user.user_id);

    let feedback = state
        .services
        .feedback
        .submit(
            user_id,
            FeedbackInput {
                document_types: req.document_types,
                process_ideas: req.process_ideas,
                general_notes: req.general_notes,
                rating: req.rating,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitFeedbackResponse {
            message: "Thank you for your feedback!".to_string(),
            feedback_id: feedback.id,
        }),
    ))
}

pub async fn prompts() -> Json<PromptsResponse> {
    let text = |field: &str, question: &str, question_en: &str, placeholder: &str| FeedbackPrompt {
        field: field.to_string(),
        question: question.to_string(),
        question_en: question_en.to_string(),
        placeholder: Some(placeholder.to_string()),
        kind: None,
        min: None,
        max: None,
    };

    Json(PromptsResponse {
        prompts: vec![
            text(
                "document_types",
                "Hvilke andre dokumenttyper ønsker du at AI skal kunne tolke automatisk?",
                "What other document types would you like AI to interpret automatically?",
                "F.eks. tekniske spesifikasjoner, kontrakter, sikkerhetsdatablader...",
            ),
            text(
                "process_ideas",
                "Hvilke andre prosesser tenker du at AI-agenter kan gjøre jobben lettere?",
                "What other processes do you think AI agents could help make easier?",
                "F.eks. rapportgenerering, kvalitetskontroll, dokumentsøk...",
            ),
            text(
                "general_notes",
                "Andre tilbakemeldinger eller forslag?",
                "Any other feedback or suggestions?",
                "Vi setter pris på alle tilbakemeldinger...",
            ),
            FeedbackPrompt {
                field: "rating".to_string(),
                question: "Hvor nyttig var dette verktøyet? (1-5)".to_string(),
                question_en: "How useful was this tool? (1-5)".to_string(),
                placeholder: None,
                kind: Some("rating".to_string()),
                min: Some(MIN_RATING),
                max: Some(MAX_RATING),
            },
        ],
    })
}

/// The caller's own submissions, newest first
pub async fn mine(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> ApiResult<Json<MyFeedbackResponse>> {
    let feedback = state
        .services
        .feedback
        .list_for_user(current.user.user_id)
        .await?;

    Ok(Json(MyFeedbackResponse { feedback }))
}
