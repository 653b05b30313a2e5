//! Application state and router builder
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use snowlion_api::{app::{build_router, AppState}, config::Config};
//! use snowlion_shared::{auth::LogDelivery, clock::SystemClock, store::MemoryStore, Services};
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let services = Services::new(
//!     MemoryStore::arc(),
//!     Arc::new(SystemClock),
//!     Arc::new(LogDelivery),
//!     config.policy,
//! );
//! let app = build_router(AppState::new(services, config));
//! # Ok(())
//! # }
//! ```

use crate::{
    config::Config,
    middleware::{
        auth::{admin_key_layer, optional_session_layer, session_auth_layer},
        security::security_headers,
    },
};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use snowlion_shared::Services;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Core components
    pub services: Services,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(services: Services, config: Config) -> Self {
        Self {
            services,
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── GET  /health
/// └── /api
///     ├── /auth
///     │   ├── POST /signup
///     │   ├── GET  /verify?token=
///     │   ├── POST /login
///     │   ├── GET  /login/complete?token=
///     │   ├── POST /logout                       (session)
///     │   └── GET  /me                           (session)
///     ├── /usage
///     │   ├── GET  /stats                        (session)
///     │   └── GET  /history?limit=               (session)
///     ├── /documents
///     │   ├── GET  /formats
///     │   └── POST /process/:document_id         (session)
///     ├── /feedback
///     │   ├── POST /                             (optional session)
///     │   ├── GET  /prompts
///     │   └── GET  /mine                         (session)
///     └── /admin                                 (X-Admin-Key)
///         ├── PUT  /users/:id/extend-trial
///         └── PUT  /users/:id/deactivate
/// ```
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let session_guard = axum::middleware::from_fn_with_state(state.clone(), session_auth_layer);

    let auth_routes = Router::new()
        .route("/logout", post(routes::auth::logout))
        .route("/me", get(routes::auth::me))
        .route_layer(session_guard.clone())
        .route("/signup", post(routes::auth::signup))
        .route("/verify", get(routes::auth::verify))
        .route("/login", post(routes::auth::login))
        .route("/login/complete", get(routes::auth::complete_login));

    let usage_routes = Router::new()
        .route("/stats", get(routes::usage::stats))
        .route("/history", get(routes::usage::history))
        .route_layer(session_guard.clone());

    let document_routes = Router::new()
        .route("/process/:document_id", post(routes::documents::process))
        .route_layer(session_guard.clone())
        .route("/formats", get(routes::documents::formats));

    let feedback_routes = Router::new()
        .route(
            "/",
            post(routes::feedback::submit).route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                optional_session_layer,
            )),
        )
        .route("/mine", get(routes::feedback::mine).route_layer(session_guard))
        .route("/prompts", get(routes::feedback::prompts));

    let admin_routes = Router::new()
        .route("/users/:id/extend-trial", put(routes::admin::extend_trial))
        .route("/users/:id/deactivate", put(routes::admin::deactivate))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            admin_key_layer,
        ));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/usage", usage_routes)
        .nest("/documents", document_routes)
        .nest("/feedback", feedback_routes)
        .nest("/admin", admin_routes);

    let cors = if state.config.cors_permissive() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
            .allow_headers([
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                HeaderName::from_static(crate::middleware::auth::ADMIN_KEY_HEADER),
            ])
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(axum::middleware::from_fn(security_headers))
        .with_state(state)
}
