//! # Snowlion API Server
//!
//! Trial backend for the Snowlion BOM extraction service: passwordless
//! signup and login, bearer sessions, and a weekly document quota.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/snowlion ADMIN_KEY=... cargo run -p snowlion-api
//! ```

use snowlion_api::{
    app::{build_router, AppState},
    config::Config,
    reaper::spawn_session_reaper,
};
use snowlion_shared::{
    auth::LogDelivery,
    clock::SystemClock,
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    store::PgStore,
    Services,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!(
        "Snowlion API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;
    config.policy.validate()?;

    let pool = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await?;
    run_migrations(&pool).await?;

    let services = Services::new(
        Arc::new(PgStore::new(pool.clone())),
        Arc::new(SystemClock),
        Arc::new(LogDelivery),
        config.policy,
    );

    if config.api.expose_dev_tokens {
        tracing::warn!("EXPOSE_DEV_TOKENS is enabled; tokens are returned in API responses");
    }

    let reaper = config
        .session_reaper_interval_secs
        .map(|secs| spawn_session_reaper(services.sessions.clone(), Duration::from_secs(secs)));

    let address = config.bind_address();
    let app = build_router(AppState::new(services, config));

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(reaper) = reaper {
        reaper.abort();
    }
    close_pool(pool).await;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "snowlion_api=debug,snowlion_shared=debug,tower_http=debug".into()
    });

    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
