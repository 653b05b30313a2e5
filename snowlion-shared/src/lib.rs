//! # Snowlion Shared Library
//!
//! Core of the Snowlion trial backend: user onboarding, magic-link
//! authentication, bearer sessions, the usage ledger and the weekly
//! document quota. The HTTP server in `snowlion-api` is a thin layer over
//! the components exported here.
//!
//! ## Module Organization
//!
//! - `auth`: token issuance and out-of-band token delivery
//! - `models`: database rows and insert payloads
//! - `store`: storage traits with Postgres and in-memory implementations
//! - `db`: connection pool and migrations
//! - `directory`, `sessions`, `flow`: the authentication lifecycle
//! - `ledger`, `quota`: usage accounting and the weekly quota
//! - `feedback`: product feedback from trial users
//! - `services`: wires every component over one storage handle

pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod feedback;
pub mod flow;
pub mod ledger;
pub mod models;
pub mod quota;
pub mod services;
pub mod sessions;
pub mod store;

pub use error::{CoreError, CoreResult};
pub use services::Services;

/// Current version of the Snowlion shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
