//! Document endpoints
//!
//! - `GET  /api/documents/formats` - Accepted upload formats (public)
//! - `POST /api/documents/process/:document_id` - Generate a BOM (authenticated, quota-gated)
//!
//! Extraction is not wired to a model yet: processing charges the weekly
//! quota with a simulated token count and returns a placeholder BOM.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::auth::CurrentSession,
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use snowlion_shared::ledger::UsageDetails;

/// Largest accepted upload
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Longest accepted document id
pub const MAX_DOCUMENT_ID_LENGTH: usize = 128;

const SUPPORTED_FORMATS: [(&str, &str); 6] = [
    (".pdf", "PDF documents"),
    (".docx", "Microsoft Word (2007+)"),
    (".doc", "Microsoft Word (legacy)"),
    (".xlsx", "Microsoft Excel (2007+)"),
    (".xls", "Microsoft Excel (legacy)"),
    (".csv", "Comma-separated values"),
];

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentFormat {
    pub extension: String,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FormatsResponse {
    pub supported: Vec<DocumentFormat>,
    pub max_size: String,
    pub max_size_bytes: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BomItem {
    pub part_number: String,
    pub description: String,
    pub quantity: u32,
    pub unit: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Bom {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub items: Vec<BomItem>,
    pub notes: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub document_id: String,
    pub status: String,
    pub processed_at: DateTime<Utc>,
    pub tokens_used: i64,
    pub bom: Bom,
}

pub async fn formats() -> Json<FormatsResponse> {
    Json(FormatsResponse {
        supported: SUPPORTED_FORMATS
            .iter()
            .map(|(extension, description)| DocumentFormat {
                extension: extension.to_string(),
                description: description.to_string(),
            })
            .collect(),
        max_size: "10MB".to_string(),
        max_size_bytes: MAX_UPLOAD_BYTES,
    })
}

/// Process a document into a bill of materials
///
/// # Errors
///
/// - `400 Bad Request`: malformed document id
/// - `429 Too Many Requests`: weekly document limit reached; nothing is recorded
pub async fn process(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Path(document_id): Path<String>,
) -> ApiResult<Json<ProcessResponse>> {
    let document_id = document_id.trim().to_string();
    if document_id.is_empty() || document_id.len() > MAX_DOCUMENT_ID_LENGTH {
        return Err(ApiError::BadRequest("Invalid document id".to_string()));
    }

    let tokens_used: i64 = rand::thread_rng().gen_range(500..2500);

    let entry = state
        .services
        .quota
        .charge_document(
            current.user.user_id,
            UsageDetails {
                tokens_used,
                document_name: Some(format!("doc_{}", document_id)),
            },
        )
        .await?;

    tracing::info!(
        user_id = %current.user.user_id,
        document_id = %document_id,
        tokens_used,
        "BOM generated"
    );

    Ok(Json(ProcessResponse {
        document_id,
        status: "completed".to_string(),
        processed_at: entry.created_at,
        tokens_used: entry.tokens_used,
        bom: placeholder_bom(entry.created_at),
    }))
}

fn placeholder_bom(generated_at: DateTime<Utc>) -> Bom {
    let item = |part_number: &str, description: &str, quantity: u32, unit: &str| BomItem {
        part_number: part_number.to_string(),
        description: description.to_string(),
        quantity,
        unit: unit.to_string(),
    };

    Bom {
        title: "Extracted Bill of Materials".to_string(),
        generated_at,
        items: vec![
            item("PLH-001", "Placeholder Item 1", 10, "pcs"),
            item("PLH-002", "Placeholder Item 2", 5, "pcs"),
            item("PLH-003", "Placeholder Item 3", 20, "m"),
        ],
        notes: "Placeholder BOM. Model-backed extraction is not enabled.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_formats_list() {
        let Json(response) = formats().await;
        let extensions: Vec<&str> = response
            .supported
            .iter()
            .map(|f| f.extension.as_str())
            .collect();

        assert_eq!(extensions, [".pdf", ".docx", ".doc", ".xlsx", ".xls", ".csv"]);
        assert_eq!(response.max_size_bytes, 10_485_760);
    }

    #[test]
    fn test_placeholder_bom_items() {
        let bom = placeholder_bom(Utc::now());
        let parts: Vec<&str> = bom.items.iter().map(|i| i.part_number.as_str()).collect();
        assert_eq!(parts, ["PLH-001", "PLH-002", "PLH-003"]);
    }
}
