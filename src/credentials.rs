//! Credential primitives
//!
//! - Argon2id password hashing
//! - Random bearer tokens and the digests sessions are stored under
//! - Human-readable request codes (`AXQ-4821`)
//! - Secret comparison for the admin bootstrap secret

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use crate::error::{PortalError, Result};

const TOKEN_BYTES: usize = 32;

fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut buf = [0_u8; N];
    getrandom::fill(&mut buf).map_err(|e| PortalError::Worker(format!("RNG unavailable: {e}")))?;
    Ok(buf)
}

/// Hash a password into a PHC string
pub fn hash_password(password: &str) -> Result<String> {
    let salt_bytes: [u8; 16] = random_bytes()?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| PortalError::Worker(format!("Salt encoding failed: {e}")))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PortalError::Worker(format!("Password hashing failed: {e}")))
}

/// Check a password against a stored PHC string
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(password_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// New opaque bearer token
pub fn new_session_token() -> Result<String> {
    let bytes: [u8; TOKEN_BYTES] = random_bytes()?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Key a session is stored under; the raw token is never persisted
pub fn token_digest(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

/// `PREFIX-####` with four digits in 1000..=9999
pub fn new_request_code(prefix: &str) -> Result<String> {
    let bytes: [u8; 2] = random_bytes()?;
    let n = 1000 + u16::from_le_bytes(bytes) % 9000;
    Ok(format!("{prefix}-{n}"))
}

/// Compare two secrets through their SHA-256 digests without early exit
pub fn secrets_match(given: &str, expected: &str) -> bool {
    let a = Sha256::digest(given.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0_u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }

    #[test]
    fn test_session_tokens_are_url_safe_and_unique() {
        let a = new_session_token().unwrap();
        let b = new_session_token().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(!a.contains('+') && !a.contains('/') && !a.contains('='));
    }

    #[test]
    fn test_token_digest_is_stable() {
        assert_eq!(token_digest("abc"), token_digest("abc"));
        assert_ne!(token_digest("abc"), token_digest("abd"));
        assert_ne!(token_digest("abc"), "abc");
    }

    #[test]
    fn test_request_code_format() {
        for _ in 0..50 {
            let code = new_request_code("AXQ").unwrap();
            let (prefix, digits) = code.split_once('-').unwrap();
            assert_eq!(prefix, "AXQ");
            let n: u16 = digits.parse().unwrap();
            assert!((1000..=9999).contains(&n));
        }
    }

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("open-sesame", "open-sesame"));
        assert!(!secrets_match("open-sesame", "Open-sesame"));
        assert!(!secrets_match("", "open-sesame"));
    }
}
