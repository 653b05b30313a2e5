//! Opaque token issuance
//!
//! Verification tokens, login tokens and session tokens all share one format:
//! 32 bytes from the operating system CSPRNG, hex-encoded to 64 lowercase
//! characters. Tokens carry no structure; the database row they are stored
//! against is the only source of meaning.
//!
//! Session tokens are long-lived bearer credentials and are stored only as
//! their SHA-256 digest ([`hash_token`]).
//!
//! # Example
//!
//! ```
//! use snowlion_shared::auth::token::{generate_token, hash_token, is_well_formed, TOKEN_LENGTH};
//!
//! let token = generate_token();
//! assert_eq!(token.len(), TOKEN_LENGTH);
//! assert!(is_well_formed(&token));
//! assert_ne!(hash_token(&token), token);
//! ```

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Random bytes per token
pub const TOKEN_BYTES: usize = 32;

/// Length of the hex-encoded token
pub const TOKEN_LENGTH: usize = TOKEN_BYTES * 2;

/// Generates a fresh opaque token
///
/// # Returns
///
/// 64 lowercase hex characters encoding 256 bits of entropy
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Checks that a presented token has the issued shape
///
/// Callers reject anything else before it reaches storage.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LENGTH
        && token
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// SHA-256 digest of a token, as 64 lowercase hex characters
///
/// Deterministic, so a stored digest is looked up by hashing the presented
/// token the same way.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Constant-time string comparison
///
/// Comparison time depends only on the length of the inputs, not on the
/// position of the first differing byte.
///
/// # Arguments
///
/// * `a` - First string
/// * `b` - Second string
///
/// # Returns
///
/// `true` if strings are equal, `false` otherwise
///
/// # Example
///
/// ```
/// use snowlion_shared::auth::token::constant_time_compare;
///
/// assert!(constant_time_compare("admin-key", "admin-key"));
/// assert!(!constant_time_compare("admin-key", "admin-kez"));
/// ```
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_token_format() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(token, token.to_lowercase());
    }

    #[test]
    fn test_generate_token_uniqueness() {
        let tokens: HashSet<_> = (0..1000).map(|_| generate_token()).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn test_is_well_formed() {
        assert!(is_well_formed(&generate_token()));
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("abc"));
        assert!(!is_well_formed(&"G".repeat(64)));
        assert!(!is_well_formed(&"A".repeat(64)));
    }

    #[test]
    fn test_hash_token() {
        let token = generate_token();
        let hash = hash_token(&token);

        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_token(&token));
        assert_ne!(hash, token);
        assert_ne!(hash, hash_token(&generate_token()));
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("", ""));
        assert!(constant_time_compare("same-value", "same-value"));
        assert!(!constant_time_compare("same-value", "same-valuE"));
        assert!(!constant_time_compare("short", "longer-value"));
    }
}
