//! Argon2id password hashing.

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

/// Password hashing failures.
#[derive(Debug, Error)]
pub enum PasswordError {
    /// Hashing itself failed.
    #[error("password hashing failed")]
    Hash,
    /// The password does not match the hash.
    #[error("password does not match")]
    Mismatch,
}

/// Hash verified when no account exists, so unknown emails cost the same as
/// wrong passwords.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("marketstall-timing-equalizer").ok());

/// Hash a password using Argon2id with a random salt.
///
/// # Errors
///
/// Returns `PasswordError::Hash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| PasswordError::Hash)
}

/// Verify a password against a stored PHC hash string.
///
/// # Errors
///
/// Returns `PasswordError::Mismatch` if the password is wrong or the stored
/// hash is unparseable.
pub fn verify_password(password: &str, hash: &str) -> Result<(), PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|_| PasswordError::Mismatch)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| PasswordError::Mismatch)
}

/// Burn the same time as a real verification, then fail.
///
/// # Errors
///
/// Always returns `PasswordError::Mismatch`.
pub fn verify_against_dummy(password: &str) -> Result<(), PasswordError> {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
    Err(PasswordError::Mismatch)
}
