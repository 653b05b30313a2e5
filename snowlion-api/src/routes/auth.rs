//! Authentication endpoints
//!
//! - `POST /api/auth/signup` - Register a trial user
//! - `GET  /api/auth/verify?token=` - Confirm the signup email
//! - `POST /api/auth/login` - Request a magic login link
//! - `GET  /api/auth/login/complete?token=` - Exchange the link for a session
//! - `POST /api/auth/logout` - End the current session
//! - `GET  /api/auth/me` - Current user

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    middleware::auth::CurrentSession,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snowlion_shared::{directory::CreateUser, models::Industry, CoreError};
use uuid::Uuid;
use validator::Validate;

/// Reply to every well-formed login request, known email or not
pub const LOGIN_REQUESTED_MESSAGE: &str = "If this email is registered, a login link has been sent";

/// Signup request
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(max = 200, message = "Company name must be at most 200 characters"))]
    pub company_name: Option<String>,

    /// One of energy, defence, shipbuilding, datacenter, other
    pub industry: Option<String>,

    #[validate(length(max = 50, message = "Company size must be at most 50 characters"))]
    pub company_size: Option<String>,
}

/// Signup response
#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResponse {
    pub message: String,
    pub user_id: Uuid,
    pub trial_ends_at: DateTime<Utc>,

    /// Only present when dev tokens are exposed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_verification_token: Option<String>,
}

/// `?token=` query of the magic-link endpoints
#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub message: String,
    pub email: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,

    /// Only present when dev tokens are exposed and a link was actually issued
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_login_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteLoginResponse {
    pub message: String,

    /// Bearer token for subsequent requests
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub email: String,
    pub company_name: Option<String>,
    pub industry: Option<String>,
    pub trial_ends_at: DateTime<Utc>,
}

/// Register a trial user
///
/// ```text
/// POST /api/auth/signup
/// Content-Type: application/json
///
/// { "email": "ops@yard.no", "company_name": "Yard AS", "industry": "shipbuilding" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: invalid email or unknown industry
/// - `409 Conflict`: email already registered
pub async fn signup(
    State(state): State<AppState>,
    Json(mut req): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<SignupResponse>)> {
    req.email = req.email.trim().to_string();
    req.validate()?;

    let industry = match req.industry.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(parse_industry(raw)?),
    };

    let user = state
        .services
        .flow
        .signup(CreateUser {
            email: req.email,
            company_name: req.company_name,
            industry,
            company_size: req.company_size,
        })
        .await?;

    let dev_verification_token = if state.config.api.expose_dev_tokens {
        user.verification_token.clone()
    } else {
        None
    };

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "Account created. Check your email to verify.".to_string(),
            user_id: user.id,
            trial_ends_at: user.trial_ends_at,
            dev_verification_token,
        }),
    ))
}

/// Confirm the signup email
///
/// # Errors
///
/// - `400 Bad Request`: token missing, unknown, already used or expired
pub async fn verify(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> ApiResult<Json<VerifyResponse>> {
    let token = required_token(query, "Verification token required")?;
    let user = state.services.flow.verify_email(&token).await?;

    Ok(Json(VerifyResponse {
        message: "Email verified successfully".to_string(),
        email: user.email,
    }))
}

/// Request a magic login link
///
/// Answers with the same message whether or not the email belongs to an
/// active, verified user.
pub async fn login(
    State(state): State<AppState>,
    Json(mut req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.email = req.email.trim().to_string();
    req.validate()?;

    let dev_login_token = match state.services.flow.request_login(&req.email).await {
        Ok(login) => state.config.api.expose_dev_tokens.then_some(login.token),
        Err(CoreError::UserNotFound) | Err(CoreError::EmailNotVerified) => {
            tracing::debug!("Login requested for unknown or unverified email");
            None
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(LoginResponse {
        message: LOGIN_REQUESTED_MESSAGE.to_string(),
        dev_login_token,
    }))
}

/// Exchange a login token for a session
///
/// # Errors
///
/// - `400 Bad Request`: token missing, unknown, already used or expired
pub async fn complete_login(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> ApiResult<Json<CompleteLoginResponse>> {
    let token = required_token(query, "Login token required")?;
    let session = state.services.flow.complete_login(&token).await?;

    Ok(Json(CompleteLoginResponse {
        message: "Login successful".to_string(),
        token: session.token,
        expires_at: session.expires_at,
    }))
}

/// End the current session
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> ApiResult<Json<MessageResponse>> {
    state.services.flow.logout(&current.token).await?;

    Ok(Json(MessageResponse {
        message: "Logged out successfully".to_string(),
    }))
}

/// Current user
pub async fn me(Extension(current): Extension<CurrentSession>) -> Json<MeResponse> {
    let user = current.user;

    Json(MeResponse {
        user_id: user.user_id,
        email: user.email,
        company_name: user.company_name,
        industry: user.industry,
        trial_ends_at: user.trial_ends_at,
    })
}

fn parse_industry(raw: &str) -> ApiResult<Industry> {
    Industry::from_str(&raw.to_ascii_lowercase()).ok_or_else(|| {
        let options: Vec<&str> = Industry::ALL.iter().map(Industry::as_str).collect();
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "industry".to_string(),
            message: format!("Invalid industry. Valid options: {}", options.join(", ")),
        }])
    })
}

fn required_token(query: TokenQuery, missing: &str) -> ApiResult<String> {
    query
        .token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::BadRequest(missing.to_string()))
}
