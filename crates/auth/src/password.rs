//! Argon2id password hashing.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password must be between {MIN_PASSWORD_LENGTH} and {MAX_PASSWORD_LENGTH} characters")]
    InvalidLength,

    #[error("invalid credentials")]
    Mismatch,

    #[error("password hashing failed")]
    Hash,
}

pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&len) {
        return Err(PasswordError::InvalidLength);
    }
    Ok(())
}

/// Validate and hash a password into a PHC string.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    validate_password(password)?;
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| PasswordError::Hash)
}

/// Verify a password against a stored PHC string.
///
/// A corrupt stored hash reads as a mismatch so callers never leak which part
/// of a login failed.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<(), PasswordError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|_| PasswordError::Mismatch)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| PasswordError::Mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("gond-painting-42").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert_eq!(verify_password("gond-painting-42", &hash), Ok(()));
        assert_eq!(verify_password("wrong-password", &hash), Err(PasswordError::Mismatch));
    }

    #[test]
    fn rejects_short_password() {
        assert_eq!(hash_password("short"), Err(PasswordError::InvalidLength));
    }

    #[test]
    fn corrupt_hash_is_mismatch() {
        assert_eq!(verify_password("whatever1", "not-a-phc-string"), Err(PasswordError::Mismatch));
    }
}
