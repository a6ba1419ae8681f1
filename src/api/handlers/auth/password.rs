//! Password hashing with Argon2id.
//!
//! Hashes carry their own salt and parameters in PHC string format, so
//! verification never needs out-of-band state. Verification is deliberately
//! infallible: a malformed stored hash verifies as `false` rather than
//! surfacing an error to the login path.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use rand::rngs::OsRng;

pub(super) const MIN_PASSWORD_LEN: usize = 8;

/// Hash a plaintext password with a fresh random salt.
pub(super) fn hash_password(plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| anyhow!("failed to hash password"))
}

/// Verify a plaintext password against a stored PHC hash.
pub(super) fn verify_password(plaintext: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}
