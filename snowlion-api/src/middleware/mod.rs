//! HTTP middleware
//!
//! - `auth`: bearer session and admin key guards
//! - `security`: response hardening headers

pub mod auth;
pub mod security;
