//! Authentication models for the Lifeline backend

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use super::UserResponse;

/// Authenticated device session.
///
/// `refresh_token_hash` holds the sha256 hex digest of the one currently
/// valid refresh token; the raw token is never stored. A session whose
/// `revoked_at` is set is permanently inert.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub device_id: Option<String>,
    pub fcm_token: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Append-only login audit record
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct LoginAttempt {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub email: String,
    pub ip_address: String,
    pub user_agent: String,
    pub successful: bool,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
    pub device_id: Option<String>,
    pub fcm_token: Option<String>,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Logout request
#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

/// Email verification request
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyEmailRequest {
    #[validate(length(min = 1))]
    pub token: String,
}

/// Resend verification email request
#[derive(Debug, Deserialize, Validate)]
pub struct ResendVerificationRequest {
    #[validate(email)]
    pub email: String,
}

/// Push-token update request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateFcmTokenRequest {
    pub session_id: Uuid,
    #[validate(length(min = 1, max = 512))]
    pub fcm_token: String,
}

/// Response for register: user, token pair and a verification hint
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    /// Only present when the deployment explicitly exposes raw verification
    /// tokens (development tooling); production delivers them out-of-band.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verification_token: Option<String>,
    pub message: String,
}

/// Response for login
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
}

/// Response for refresh: the new token pair only
#[derive(Debug, Serialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Generic acknowledgement response
#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// Response for email verification
#[derive(Debug, Serialize)]
pub struct VerifyEmailResponse {
    pub ok: bool,
    pub message: String,
    pub user: UserResponse,
}

/// Response for resend-verification
#[derive(Debug, Serialize)]
pub struct ResendVerificationResponse {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verification_token: Option<String>,
}
