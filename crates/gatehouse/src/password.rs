//! Password hashing.
//!
//! The service never compares plaintext against plaintext. It hands the
//! password to a [`PasswordHasher`] once at registration and stores the
//! digest; login and account deletion ask the hasher to verify.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher as _, PasswordVerifier as _};
use rand::Rng;

/// Hashing failed. Only the message is kept; it goes to the event log,
/// never to the caller.
#[derive(Debug, thiserror::Error)]
#[error("password hashing failed: {0}")]
pub struct PasswordError(pub String);

/// One-way password digests.
///
/// Synchronous on purpose: real hashers are CPU-bound, so the service
/// runs them on the blocking pool rather than awaiting inside them.
pub trait PasswordHasher: Send + Sync + 'static {
    /// Produces a salted digest of `password`.
    fn hash(&self, password: &str) -> Result<String, PasswordError>;

    /// Returns `true` iff `password` matches `digest`. A digest that
    /// doesn't parse simply doesn't match.
    fn verify(&self, password: &str, digest: &str) -> bool;
}

/// Argon2id with the crate's default parameters and a random 16-byte
/// salt per digest. Digests are self-describing PHC strings
/// (`$argon2id$v=19$...`), so parameters can change later without
/// invalidating stored ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

impl Argon2Hasher {
    fn salt() -> Result<SaltString, PasswordError> {
        let mut bytes = [0u8; 16];
        rand::rng().fill(&mut bytes);
        SaltString::encode_b64(&bytes).map_err(|e| PasswordError(e.to_string()))
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = Self::salt()?;
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| PasswordError(e.to_string()))
    }

    fn verify(&self, password: &str, digest: &str) -> bool {
        PasswordHash::new(digest)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }
}
