//! Error handling for the API server
//!
//! Every handler returns `Result<T, ApiError>`. Core errors convert through
//! `From<CoreError>`, so `?` is enough to map a failed operation to the right
//! status code. Bodies always have the shape
//! `{ "error": code, "message": text }`; internal failures are logged and
//! replaced by a generic message.
//!
//! | Core error                          | Status |
//! |-------------------------------------|--------|
//! | `DuplicateEmail`                    | 409    |
//! | `Unauthenticated`                   | 401    |
//! | `EmailNotVerified`, `TrialExpired`  | 403    |
//! | `InvalidToken`, `TokenExpired`, `InvalidRange`, `EmptyFeedback` | 400 |
//! | `NotFound`, `UserNotFound`          | 404    |
//! | `QuotaExceeded`                     | 429    |
//! | `Storage`                           | 500    |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snowlion_shared::CoreError;
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Request body failed validation (400)
    ValidationError(Vec<ValidationErrorDetail>),

    /// Missing or invalid session (401)
    Unauthorized(String),

    /// Email not yet verified (403)
    EmailNotVerified,

    /// Trial window closed (403)
    TrialExpired { trial_ends_at: DateTime<Utc> },

    /// Not found (404)
    NotFound(String),

    /// Conflict (409), e.g. duplicate email
    Conflict(String),

    /// Weekly document quota exhausted (429)
    QuotaExceeded { limit: u32, used: u32 },

    /// Internal server error (500)
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "trial_expired")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::EmailNotVerified => write!(f, "Email not verified"),
            ApiError::TrialExpired { trial_ends_at } => {
                write!(f, "Trial expired at {}", trial_ends_at)
            }
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::QuotaExceeded { limit, used } => {
                write!(f, "Weekly document limit reached ({}/{})", used, limit)
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::EmailNotVerified => (
                StatusCode::FORBIDDEN,
                "email_not_verified",
                "Please verify your email first".to_string(),
                None,
            ),
            ApiError::TrialExpired { trial_ends_at } => (
                StatusCode::FORBIDDEN,
                "trial_expired",
                format!(
                    "Your trial ended at {}. Contact sales to continue.",
                    trial_ends_at.to_rfc3339()
                ),
                None,
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::QuotaExceeded { limit, used } => (
                StatusCode::TOO_MANY_REQUESTS,
                "quota_exceeded",
                format!(
                    "Weekly document limit reached ({}/{}). The limit resets on Sunday.",
                    used, limit
                ),
                None,
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Convert core errors to API errors
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::DuplicateEmail => ApiError::Conflict("Email already registered".to_string()),
            CoreError::InvalidToken => {
                ApiError::BadRequest("Invalid or already used token".to_string())
            }
            CoreError::TokenExpired => ApiError::BadRequest("Token expired".to_string()),
            CoreError::InvalidRange { .. } | CoreError::EmptyFeedback => {
                ApiError::BadRequest(err.to_string())
            }
            CoreError::UserNotFound => ApiError::NotFound("User not found".to_string()),
            CoreError::NotFound(_) => ApiError::NotFound("User not found".to_string()),
            CoreError::Unauthenticated => ApiError::Unauthorized("Not authenticated".to_string()),
            CoreError::EmailNotVerified => ApiError::EmailNotVerified,
            CoreError::TrialExpired { trial_ends_at } => ApiError::TrialExpired { trial_ends_at },
            CoreError::QuotaExceeded { limit, used } => ApiError::QuotaExceeded { limit, used },
            CoreError::Storage(e) => ApiError::InternalError(e.to_string()),
        }
    }
}

/// Convert validator errors to API errors
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| ValidationErrorDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid {}", field)),
                })
            })
            .collect();

        ApiError::ValidationError(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snowlion_shared::store::StoreError;

    fn status_of(err: CoreError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::QuotaExceeded { limit: 10, used: 10 };
        assert_eq!(err.to_string(), "Weekly document limit reached (10/10)");
    }

    #[test]
    fn test_core_error_status_mapping() {
        assert_eq!(status_of(CoreError::DuplicateEmail), StatusCode::CONFLICT);
        assert_eq!(status_of(CoreError::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(CoreError::EmailNotVerified), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(CoreError::TrialExpired {
                trial_ends_at: Utc::now()
            }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(CoreError::InvalidRange {
                min: 1,
                max: 365,
                actual: 0
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(CoreError::InvalidToken), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(CoreError::EmptyFeedback), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(CoreError::TokenExpired), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(CoreError::NotFound(uuid::Uuid::nil())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(CoreError::QuotaExceeded { limit: 2, used: 2 }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_of(CoreError::Storage(StoreError::UniqueViolation(
                "sessions_token_hash_key".to_string()
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_error_hides_details() {
        let err = ApiError::from(CoreError::Storage(StoreError::ForeignKeyViolation(
            "usage_logs_user_id_fkey".to_string(),
        )));
        assert!(matches!(err, ApiError::InternalError(ref msg) if msg.contains("usage_logs")));
    }
}
