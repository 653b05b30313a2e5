//! Admin endpoints, guarded by `X-Admin-Key`
//!
//! - `PUT /api/admin/users/:id/extend-trial` - `{ "days": 1..=365 }`
//! - `PUT /api/admin/users/:id/deactivate`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::auth::MessageResponse,
};
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ExtendTrialRequest {
    pub days: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtendTrialResponse {
    pub message: String,
    pub trial_ends_at: DateTime<Utc>,
}

/// Extend a user's trial
///
/// Extends from the current end, or from now if the trial already lapsed.
///
/// # Errors
///
/// - `400 Bad Request`: `days` missing or outside 1..=365
/// - `404 Not Found`: no such user
pub async fn extend_trial(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ExtendTrialRequest>,
) -> ApiResult<Json<ExtendTrialResponse>> {
    let user_id = parse_user_id(&id)?;

    // A missing value is reported as out of range
    let days = req.days.unwrap_or(0);
    let trial_ends_at = state.services.directory.extend_trial(user_id, days).await?;

    Ok(Json(ExtendTrialResponse {
        message: "Trial extended".to_string(),
        trial_ends_at,
    }))
}

/// Deactivate a user; live sessions stop working immediately
pub async fn deactivate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let user_id = parse_user_id(&id)?;
    state.services.directory.deactivate(user_id).await?;

    Ok(Json(MessageResponse {
        message: "User deactivated".to_string(),
    }))
}

fn parse_user_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound("User not found".to_string()))
}
