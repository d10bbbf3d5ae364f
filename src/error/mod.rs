//! Centralized API error handling for the Lifeline backend
//!
//! This module provides a unified error type for API responses with proper
//! HTTP status code mapping and JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;

/// API error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Account locked. Try again in {minutes_remaining} minute(s)")]
    AccountLocked { minutes_remaining: i64 },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired: {0}")]
    TokenExpired(String),

    #[error("Already verified: {0}")]
    AlreadyVerified(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Error details in the response
#[derive(Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Get the error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::AccountLocked { .. } => "ACCOUNT_LOCKED",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InvalidToken(_) => "INVALID_TOKEN",
            ApiError::TokenExpired(_) => "TOKEN_EXPIRED",
            ApiError::AlreadyVerified(_) => "ALREADY_VERIFIED",
            ApiError::TooManyRequests => "TOO_MANY_REQUESTS",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::AccountLocked { .. } => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InvalidToken(_) => StatusCode::BAD_REQUEST,
            ApiError::TokenExpired(_) => StatusCode::BAD_REQUEST,
            ApiError::AlreadyVerified(_) => StatusCode::BAD_REQUEST,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        // Log server errors
        match &self {
            ApiError::InternalError(_) | ApiError::DatabaseError(_) => {
                tracing::error!(error = %message, code = %error_code, "Server error occurred");
            }
            _ => {
                tracing::debug!(error = %message, code = %error_code, "Client error occurred");
            }
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code: error_code.to_string(),
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

// Convenience conversions from common error types

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            _ => ApiError::DatabaseError(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("Invalid JSON: {}", err))
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            // Bad credentials and every flavor of bad refresh token collapse into
            // the same 401 so the response shape cannot be used as an oracle.
            AuthError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid credentials".to_string())
            }
            AuthError::InvalidToken | AuthError::ReuseDetected => {
                ApiError::Unauthorized("Invalid refresh token".to_string())
            }
            AuthError::TokenExpired => {
                ApiError::Unauthorized("Refresh token expired".to_string())
            }
            AuthError::AccountLocked { minutes_remaining } => {
                ApiError::AccountLocked { minutes_remaining }
            }
            AuthError::EmailTaken => ApiError::Conflict("Email already exists".to_string()),
            AuthError::SessionNotFound => ApiError::NotFound("Session not found".to_string()),
            AuthError::SessionRevoked => {
                ApiError::Unauthorized("Session has been revoked".to_string())
            }
            AuthError::InvalidVerificationToken => {
                ApiError::InvalidToken("Invalid verification token".to_string())
            }
            AuthError::VerificationTokenExpired => {
                ApiError::TokenExpired("Verification token expired".to_string())
            }
            AuthError::AlreadyVerified => {
                ApiError::AlreadyVerified("Email already verified".to_string())
            }
            AuthError::Database(msg) => ApiError::DatabaseError(msg),
            AuthError::Hash(msg) | AuthError::Token(msg) => ApiError::InternalError(msg),
        }
    }
}

/// Result type alias using ApiError
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ApiError::NotFound("test".to_string()).error_code(),
            "NOT_FOUND"
        );
        assert_eq!(
            ApiError::Unauthorized("test".to_string()).error_code(),
            "UNAUTHORIZED"
        );
        assert_eq!(
            ApiError::AccountLocked {
                minutes_remaining: 3
            }
            .error_code(),
            "ACCOUNT_LOCKED"
        );
        assert_eq!(
            ApiError::AlreadyVerified("test".to_string()).error_code(),
            "ALREADY_VERIFIED"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::NotFound("test".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::AccountLocked {
                minutes_remaining: 3
            }
            .status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::Conflict("test".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::TokenExpired("test".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_reuse_detection_is_indistinguishable() {
        let reuse: ApiError = AuthError::ReuseDetected.into();
        let invalid: ApiError = AuthError::InvalidToken.into();

        assert_eq!(reuse.error_code(), invalid.error_code());
        assert_eq!(reuse.status_code(), invalid.status_code());
        assert_eq!(reuse.to_string(), invalid.to_string());
    }

    #[test]
    fn test_locked_message_carries_minutes() {
        let err = ApiError::AccountLocked {
            minutes_remaining: 14,
        };
        assert!(err.to_string().contains("14"));
    }
}
