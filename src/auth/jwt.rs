//! JWT token generation and validation
//!
//! Handles creation and verification of access and refresh tokens. The two
//! token classes are signed with distinct secrets so that compromise of one
//! cannot forge the other.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AuthConfig;

/// JWT-related errors
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,
}

/// Claims carried by access tokens: subject user id only.
#[derive(Debug, Serialize, Deserialize, Clone)]
struct AccessClaims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Claims carried by refresh tokens: subject user id plus session id.
#[derive(Debug, Serialize, Deserialize, Clone)]
struct RefreshClaims {
    sub: String,
    sid: String,
    iat: i64,
    exp: i64,
}

/// Decoded refresh-token payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTokenClaims {
    pub user_id: Uuid,
    pub session_id: Uuid,
}

/// Signs and verifies the two classes of bearer tokens.
#[derive(Clone)]
pub struct TokenCodec {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    /// Build a codec from validated configuration.
    ///
    /// Secret presence and distinctness are enforced by [`AuthConfig`] at
    /// startup; this constructor assumes both hold.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        }
    }

    /// Refresh token (and session) lifetime.
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Generate a short-lived access token for a user
    pub fn sign_access(&self, user_id: Uuid) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(|e| JwtError::EncodingFailed(e.to_string()))
    }

    /// Generate a refresh token bound to a session
    pub fn sign_refresh(&self, user_id: Uuid, session_id: Uuid) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            sid: session_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.refresh_encoding)
            .map_err(|e| JwtError::EncodingFailed(e.to_string()))
    }

    /// Verify an access token and extract the subject user id.
    ///
    /// Expiry is reported distinctly so the bearer-auth extractor can return
    /// a `TOKEN_EXPIRED` code; access tokens are not rotation-bearing
    /// secrets, so this leaks nothing useful.
    pub fn verify_access(&self, token: &str) -> Result<Uuid, JwtError> {
        let data = decode::<AccessClaims>(token, &self.access_decoding, &validation())
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                _ => JwtError::InvalidToken,
            })?;

        Uuid::parse_str(&data.claims.sub).map_err(|_| JwtError::InvalidToken)
    }

    /// Verify a refresh token and extract its payload.
    ///
    /// Signature mismatch, malformed payload and expiry all collapse into
    /// `InvalidToken`: the caller never learns which check failed.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshTokenClaims, JwtError> {
        let data = decode::<RefreshClaims>(token, &self.refresh_decoding, &validation())
            .map_err(|_| JwtError::InvalidToken)?;

        let user_id = Uuid::parse_str(&data.claims.sub).map_err(|_| JwtError::InvalidToken)?;
        let session_id = Uuid::parse_str(&data.claims.sid).map_err(|_| JwtError::InvalidToken)?;

        Ok(RefreshTokenClaims {
            user_id,
            session_id,
        })
    }
}

fn validation() -> Validation {
    let mut validation = Validation::default();
    validation.leeway = 0;
    validation
}
