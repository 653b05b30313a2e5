//! Usage endpoints (authenticated)
//!
//! - `GET /api/usage/stats` - Totals and remaining weekly quota
//! - `GET /api/usage/history?limit=` - Most recent ledger entries

use crate::{app::AppState, error::ApiResult, middleware::auth::CurrentSession};
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use snowlion_shared::{
    ledger::clamp_history_limit,
    models::{UsageLogEntry, UsageStats},
};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Lenient: anything that is not a number falls back to the default
    pub limit: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<UsageLogEntry>,
}

pub async fn stats(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> ApiResult<Json<UsageStats>> {
    let stats = state.services.quota.stats(current.user.user_id).await?;
    Ok(Json(stats))
}

/// Newest first; `limit` defaults to 50 and is capped at 100
pub async fn history(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryResponse>> {
    let requested = query
        .limit
        .as_deref()
        .and_then(|raw| raw.trim().parse::<i64>().ok());

    let history = state
        .services
        .ledger
        .history(current.user.user_id, clamp_history_limit(requested))
        .await?;

    Ok(Json(HistoryResponse { history }))
}
