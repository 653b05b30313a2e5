//! Authentication primitives
//!
//! # Modules
//!
//! - [`token`]: opaque token generation, shape checks, hashing and constant-time comparison
//! - [`delivery`]: hand-off of issued tokens to an out-of-band channel
//!
//! The magic-link lifecycle built on these lives in [`crate::flow`].

pub mod delivery;
pub mod token;

pub use delivery::{LogDelivery, OutboxDelivery, TokenDelivery, TokenPurpose};
pub use token::{constant_time_compare, generate_token, hash_token, is_well_formed};
