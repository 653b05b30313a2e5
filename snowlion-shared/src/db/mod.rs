//! Database layer
//!
//! - `pool`: PostgreSQL connection pool with a health check
//! - `migrations`: embedded schema migrations
//!
//! Queries live in [`crate::store::postgres`].

pub mod migrations;
pub mod pool;
