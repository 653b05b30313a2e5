//! Request guards
//!
//! [`session_auth_layer`] resolves `Authorization: Bearer <token>` through
//! [`AuthFlow::authenticate`](snowlion_shared::flow::AuthFlow::authenticate)
//! and attaches a [`CurrentSession`] to the request. Handlers behind it
//! extract it with `Extension<CurrentSession>`.
//!
//! [`optional_session_layer`] attaches a [`CurrentSession`] when a live
//! session is presented and lets anonymous callers through; handlers take
//! `Option<Extension<CurrentSession>>`.
//!
//! [`admin_key_layer`] guards the admin routes with the shared `X-Admin-Key`.

use crate::{app::AppState, error::ApiError};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use snowlion_shared::{auth::constant_time_compare, models::SessionUser, CoreError};

/// Header carrying the admin key
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Authenticated caller, available to handlers behind the session guard
#[derive(Debug, Clone)]
pub struct CurrentSession {
    /// The bearer token that was presented
    pub token: String,

    /// Session joined with its user
    pub user: SessionUser,
}

/// Extracts the bearer token from the Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Session authentication middleware
///
/// Rejects with 401 when no live session matches, 403 when the email is
/// unverified or the trial has ended.
pub async fn session_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())
        .map(str::to_owned)
        .ok_or(CoreError::Unauthenticated)?;

    let user = state.services.flow.authenticate(Some(&token)).await?;

    req.extensions_mut().insert(CurrentSession { token, user });

    Ok(next.run(req).await)
}

/// Identifies the caller when possible, never rejects
///
/// Only the session itself is checked; verification and trial state do not
/// matter here.
pub async fn optional_session_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(token) = bearer_token(req.headers()).map(str::to_owned) {
        if let Some(user) = state.services.sessions.validate(&token).await? {
            req.extensions_mut().insert(CurrentSession { token, user });
        }
    }

    Ok(next.run(req).await)
}

/// Admin key middleware
pub async fn admin_key_layer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = req
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Admin key required".to_string()))?;

    if !constant_time_compare(provided, &state.config.admin.key) {
        tracing::warn!(path = %req.uri().path(), "Rejected admin request with invalid key");
        return Err(ApiError::Unauthorized("Invalid admin key".to_string()));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc123")), Some("abc123"));
        assert_eq!(bearer_token(&headers("Bearer   ")), None);
        assert_eq!(bearer_token(&headers("Basic abc123")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
