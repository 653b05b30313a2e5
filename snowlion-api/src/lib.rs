//! # Snowlion API Server Library
//!
//! HTTP surface of the Snowlion trial backend.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Session and admin guards, security headers
//! - `reaper`: Background sweep of expired sessions
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod reaper;
pub mod routes;
