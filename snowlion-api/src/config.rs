//! Configuration management for the API server
//!
//! Values are read once at startup from environment variables (a `.env`
//! file is honored in development) and never change afterwards.
//!
//! # Environment Variables
//!
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
//! - `API_HOST`: Host to bind to (default: 0.0.0.0)
//! - `API_PORT`: Port to bind to (default: 8080)
//! - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: *)
//! - `ADMIN_KEY`: Shared secret for `/api/admin` routes (required, at least 16 characters)
//! - `EXPOSE_DEV_TOKENS`: Echo verification and login tokens in responses (default: false)
//! - `SESSION_REAPER_INTERVAL_SECS`: Period of the expired-session sweep (unset: disabled)
//! - `TRIAL_DURATION_DAYS`: Trial length (default: 14)
//! - `WEEKLY_DOCUMENT_LIMIT`: Documents per user per week (default: 10)
//! - `RUST_LOG`: Log filter (default: snowlion_api=debug,snowlion_shared=debug,tower_http=debug)
//! - `LOG_FORMAT`: `json` for structured logs, anything else for text
//!
//! # Example
//!
//! ```no_run
//! use snowlion_api::config::Config;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! println!("Server will listen on {}", config.bind_address());
//! # Ok(())
//! # }
//! ```

use snowlion_shared::config::PolicyConfig;
use std::env;
use std::str::FromStr;

/// Minimum length of the admin key
pub const MIN_ADMIN_KEY_LENGTH: usize = 16;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Trial and quota policy
    pub policy: PolicyConfig,

    /// Admin endpoint configuration
    pub admin: AdminConfig,

    /// Seconds between expired-session sweeps; `None` disables the sweep
    pub session_reaper_interval_secs: Option<u64>,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Include freshly issued tokens in signup and login responses
    ///
    /// Local development only. Never enable where real users sign up.
    pub expose_dev_tokens: bool,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// Admin endpoint configuration
#[derive(Clone)]
pub struct AdminConfig {
    /// Value expected in the `X-Admin-Key` header
    pub key: String,
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig").field("key", &"<redacted>").finish()
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "API_PORT", 8080u16)?;

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let expose_dev_tokens = match lookup("EXPOSE_DEV_TOKENS") {
            Some(raw) => parse_flag(&raw)
                .ok_or_else(|| anyhow::anyhow!("EXPOSE_DEV_TOKENS must be true or false"))?,
            None => false,
        };

        let url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;
        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10u32)?;

        let admin_key = lookup("ADMIN_KEY")
            .ok_or_else(|| anyhow::anyhow!("ADMIN_KEY environment variable is required"))?;

        if admin_key.len() < MIN_ADMIN_KEY_LENGTH {
            anyhow::bail!(
                "ADMIN_KEY must be at least {} characters long",
                MIN_ADMIN_KEY_LENGTH
            );
        }

        let session_reaper_interval_secs = match lookup("SESSION_REAPER_INTERVAL_SECS") {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|e| {
                    anyhow::anyhow!("SESSION_REAPER_INTERVAL_SECS is not a number: {}", e)
                })?;
                if secs == 0 {
                    anyhow::bail!("SESSION_REAPER_INTERVAL_SECS must be positive");
                }
                Some(secs)
            }
            None => None,
        };

        let policy = PolicyConfig::from_lookup(&lookup)?;

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
                expose_dev_tokens,
            },
            database: DatabaseConfig {
                url,
                max_connections,
            },
            policy,
            admin: AdminConfig { key: admin_key },
            session_reaper_interval_secs,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Whether CORS should accept any origin
    pub fn cors_permissive(&self) -> bool {
        self.api.cors_origins.iter().any(|origin| origin == "*")
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} is invalid: {}", key, e)),
        None => Ok(default),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
