//! Authentication and session lifecycle for the Lifeline backend
//!
//! - Credential verification with bcrypt and brute-force lockout
//! - JWT access/refresh token pairs signed with distinct secrets
//! - Refresh-token rotation with reuse detection

mod crypto;
mod guard;
mod jwt;
mod repo;
mod service;
mod session;

pub use crypto::{constant_time_eq, hash_password, random_hex_token, sha256_hex, verify_password};
pub use guard::{AttemptGuard, LockoutPolicy};
pub use jwt::{JwtError, RefreshTokenClaims, TokenCodec};
pub use repo::{AuthRepo, NewLoginAttempt, NewSession, NewUser, PgAuthRepo, RepoError};
pub use service::{AuthService, LoginOutcome, LoginParams, RegisterOutcome, RegisterParams};
pub use session::{SessionRotator, TokenPair};

use thiserror::Error;

/// Auth subsystem errors, raised at the orchestrator boundary.
///
/// `ReuseDetected` is an internal distinction only: the HTTP layer collapses
/// it into the same response as `InvalidToken`.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account locked. Try again in {minutes_remaining} minute(s)")]
    AccountLocked { minutes_remaining: i64 },

    #[error("Email already in use")]
    EmailTaken,

    #[error("Invalid refresh token")]
    InvalidToken,

    #[error("Refresh token reuse detected")]
    ReuseDetected,

    #[error("Refresh token expired")]
    TokenExpired,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Session has been revoked")]
    SessionRevoked,

    #[error("Invalid verification token")]
    InvalidVerificationToken,

    #[error("Verification token expired")]
    VerificationTokenExpired,

    #[error("Email already verified")]
    AlreadyVerified,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Token error: {0}")]
    Token(String),
}

impl From<RepoError> for AuthError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Duplicate => AuthError::EmailTaken,
            RepoError::Database(msg) => AuthError::Database(msg),
        }
    }
}
