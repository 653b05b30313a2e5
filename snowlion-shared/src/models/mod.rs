//! Database models
//!
//! Plain row types plus the insert payloads the core components build. Query
//! code lives behind the traits in [`crate::store`] so the same models back
//! both the Postgres and the in-memory store.
//!
//! # Models
//!
//! - [`user`]: trial users and their pending token
//! - [`session`]: bearer sessions and the session/user projection
//! - [`usage`]: the append-only usage ledger and derived statistics
//! - [`feedback`]: product feedback, optionally tied to a user

pub mod feedback;
pub mod session;
pub mod usage;
pub mod user;

pub use feedback::{Feedback, NewFeedback};
pub use session::{NewSession, Session, SessionUser};
pub use usage::{actions, NewUsageEntry, UsageLogEntry, UsageStats};
pub use user::{Industry, NewUser, User};
