//! Password hashing and token digest primitives

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Errors from the hashing primitives
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),
}

/// Hash a password with bcrypt at the given cost factor.
pub fn hash_password(password: &str, cost: u32) -> Result<String, CryptoError> {
    bcrypt::hash(password, cost).map_err(|e| CryptoError::HashingFailed(e.to_string()))
}

/// Verify a password against a stored bcrypt hash.
///
/// An unparseable hash counts as a mismatch rather than an error; callers
/// on the login path must not distinguish the two.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// sha256 hex digest, used to store refresh tokens without keeping the raw value.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time string comparison for token digests.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Generate `n_bytes` of randomness, hex-encoded.
pub fn random_hex_token(n_bytes: usize) -> String {
    use rand::RngCore;

    let mut buf = vec![0u8; n_bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}
