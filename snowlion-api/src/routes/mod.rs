//! API route handlers
//!
//! - `health`: liveness and database connectivity
//! - `auth`: signup, email verification, magic-link login, session info
//! - `usage`: per-user statistics and history
//! - `documents`: supported formats and quota-gated processing
//! - `feedback`: product feedback from trial users and visitors
//! - `admin`: trial extension and deactivation

pub mod admin;
pub mod auth;
pub mod documents;
pub mod feedback;
pub mod health;
pub mod usage;
