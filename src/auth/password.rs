//! Argon2id password hashing.
//!
//! Hashes are PHC strings, so parameters and salt travel with the hash.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::Rng;
use std::sync::OnceLock;
use zeroize::Zeroizing;

/// Hash of a random password, checked against when no account matches.
static DUMMY_HASH: OnceLock<String> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(String),

    #[error("stored password hash is invalid: {0}")]
    InvalidHash(String),
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let mut salt_bytes = Zeroizing::new([0u8; 16]);
    rand::rng().fill(&mut salt_bytes[..]);
    let salt = SaltString::encode_b64(&salt_bytes[..])
        .map_err(|e| PasswordError::Hash(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Check a password against a stored PHC hash.
///
/// Returns `Ok(false)` on mismatch; errors only if the stored hash is unusable.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, PasswordError> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::InvalidHash(e.to_string())),
    }
}

fn dummy_hash() -> Result<&'static str, PasswordError> {
    if let Some(hash) = DUMMY_HASH.get() {
        return Ok(hash);
    }
    let mut secret = Zeroizing::new([0u8; 32]);
    rand::rng().fill(&mut secret[..]);
    let hash = hash_password(&hex::encode(&secret[..]))?;
    Ok(DUMMY_HASH.get_or_init(|| hash))
}

/// Run a full verification that can never succeed.
///
/// Login for an unknown account calls this so it costs the same as a wrong
/// password for an existing one.
pub fn verify_dummy_password(password: &str) -> Result<(), PasswordError> {
    verify_password(password, dummy_hash()?).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(hash.starts_with("$argon2id$"));

        assert!(verify_password("correct horse battery staple", &hash).unwrap());
        assert!(!verify_password("wrong password", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_invalid_stored_hash() {
        let result = verify_password("pw", "not-a-phc-string");
        assert!(matches!(result, Err(PasswordError::InvalidHash(_))));
    }

    #[test]
    fn test_dummy_hash_is_reused_and_verifiable() {
        let first = dummy_hash().unwrap();
        let second = dummy_hash().unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(first.starts_with("$argon2id$"));

        assert!(PasswordHash::new(first).is_ok());
        assert!(!verify_password("correct horse battery", first).unwrap());
        assert!(verify_dummy_password("correct horse battery").is_ok());
    }
}
