//! Common test utilities for API tests
//!
//! Builds the full router over the in-memory store, a manual clock and an
//! outbox that captures delivered tokens, so tests run without Postgres.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use snowlion_api::app::{build_router, AppState};
use snowlion_api::config::Config;
use snowlion_shared::auth::{OutboxDelivery, TokenPurpose};
use snowlion_shared::clock::ManualClock;
use snowlion_shared::quota::WeekZone;
use snowlion_shared::store::MemoryStore;
use snowlion_shared::Services;
use tower::ServiceExt;

pub const ADMIN_KEY: &str = "test-admin-key-0123456789";

/// Wednesday, mid-week
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 11, 10, 0, 0).unwrap()
}

/// Test context containing all necessary resources
pub struct TestContext {
    pub app: axum::Router,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub outbox: Arc<OutboxDelivery>,
}

/// Response status and JSON body (`Null` when the body is empty)
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_env(&[])
    }

    /// Context with extra environment overrides, e.g. `WEEKLY_DOCUMENT_LIMIT`
    pub fn with_env(overrides: &[(&str, &str)]) -> Self {
        let mut vars: HashMap<String, String> = [
            ("DATABASE_URL", "postgresql://unused/snowlion"),
            ("ADMIN_KEY", ADMIN_KEY),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in overrides {
            vars.insert(k.to_string(), v.to_string());
        }
        let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();

        let store = MemoryStore::arc();
        let clock = Arc::new(ManualClock::new(start_time()));
        let outbox = Arc::new(OutboxDelivery::new());

        let services = Services::new(store.clone(), clock.clone(), outbox.clone(), config.policy)
            .with_week_zone(WeekZone::utc());

        Self {
            app: build_router(AppState::new(services, config)),
            store,
            clock,
            outbox,
        }
    }

    /// Sends a request through the router
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).to_string())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send("GET", uri, None, &[]).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.send("POST", uri, Some(body), &[]).await
    }

    /// GET with a bearer token
    pub async fn get_as(&self, token: &str, uri: &str) -> TestResponse {
        let auth = format!("Bearer {}", token);
        self.send("GET", uri, None, &[("authorization", auth.as_str())]).await
    }

    /// POST without a body, with a bearer token
    pub async fn post_as(&self, token: &str, uri: &str) -> TestResponse {
        let auth = format!("Bearer {}", token);
        self.send("POST", uri, None, &[("authorization", auth.as_str())]).await
    }

    /// POST a JSON body with a bearer token
    pub async fn post_json_as(&self, token: &str, uri: &str, body: Value) -> TestResponse {
        let auth = format!("Bearer {}", token);
        self.send("POST", uri, Some(body), &[("authorization", auth.as_str())])
            .await
    }

    /// PUT to an admin route with the given key
    pub async fn admin_put(&self, key: Option<&str>, uri: &str, body: Value) -> TestResponse {
        match key {
            Some(key) => self.send("PUT", uri, Some(body), &[("x-admin-key", key)]).await,
            None => self.send("PUT", uri, Some(body), &[]).await,
        }
    }

    /// Signs up and verifies the email, returning the user id
    pub async fn verified_user(&self, email: &str) -> String {
        let response = self.post("/api/auth/signup", serde_json::json!({ "email": email })).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        let user_id = response.body["user_id"].as_str().unwrap().to_string();

        let token = self
            .outbox
            .latest(&email.to_lowercase(), TokenPurpose::EmailVerification)
            .await
            .unwrap();
        let response = self.get(&format!("/api/auth/verify?token={}", token)).await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);

        user_id
    }

    /// Runs the magic-link login for an existing verified user, returning the bearer token
    pub async fn login(&self, email: &str) -> String {
        let response = self.post("/api/auth/login", serde_json::json!({ "email": email })).await;
        assert_eq!(response.status, StatusCode::OK);

        let token = self
            .outbox
            .latest(&email.to_lowercase(), TokenPurpose::Login)
            .await
            .unwrap();
        let response = self
            .get(&format!("/api/auth/login/complete?token={}", token))
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);

        response.body["token"].as_str().unwrap().to_string()
    }

    /// Signup, verification and login in one step
    pub async fn session(&self, email: &str) -> (String, String) {
        let user_id = self.verified_user(email).await;
        let token = self.login(email).await;
        (user_id, token)
    }
}
