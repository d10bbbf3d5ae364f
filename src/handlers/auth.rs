//! Authentication HTTP handlers
//!
//! Thin shims over [`AuthService`]: validate the payload, hand it to the
//! service, shape the JSON response. All policy lives in the service.

use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::UserAgent;
use std::net::SocketAddr;
use validator::Validate;

use crate::auth::{LoginParams, RegisterParams};
use crate::error::ApiError;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    LoginRequest, LoginResponse, LogoutRequest, OkResponse, RefreshTokenRequest, RegisterRequest,
    RegisterResponse, ResendVerificationRequest, ResendVerificationResponse, TokenPairResponse,
    UpdateFcmTokenRequest, VerifyEmailRequest, VerifyEmailResponse,
};
use crate::state::AppState;

/// POST /auth/register - Create an account and an initial session
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    req.validate()?;

    let outcome = state
        .auth_service
        .register(RegisterParams {
            email: req.email,
            password: req.password,
            full_name: req.full_name,
            phone: req.phone,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: outcome.user,
            access_token: outcome.tokens.access_token,
            refresh_token: outcome.tokens.refresh_token,
            email_verification_token: outcome.verification_token,
            message: "Registration successful. Please verify your email address.".to_string(),
        }),
    ))
}

/// POST /auth/login - Verify credentials and open a session
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user_agent: Option<TypedHeader<UserAgent>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    req.validate()?;

    let outcome = state
        .auth_service
        .login(LoginParams {
            email: req.email,
            password: req.password,
            device_id: req.device_id,
            fcm_token: req.fcm_token,
            ip_address: addr.ip().to_string(),
            user_agent: user_agent
                .map(|TypedHeader(ua)| ua.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
        .await?;

    Ok(Json(LoginResponse {
        user: outcome.user,
        access_token: outcome.tokens.access_token,
        refresh_token: outcome.tokens.refresh_token,
    }))
}

/// POST /auth/refresh-token - Rotate a refresh token into a new pair
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let pair = state.auth_service.refresh(&req.refresh_token).await?;

    Ok(Json(TokenPairResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    }))
}

/// POST /auth/logout - Revoke the session behind a refresh token
///
/// Idempotent: an invalid or already-consumed token still yields 200.
pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<LogoutRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    state.auth_service.logout(&req.refresh_token).await;

    Ok(Json(OkResponse { ok: true }))
}

/// POST /auth/verify-email - Consume an email-verification token
pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<Json<VerifyEmailResponse>, ApiError> {
    req.validate()?;

    let user = state.auth_service.verify_email(&req.token).await?;

    Ok(Json(VerifyEmailResponse {
        ok: true,
        message: "Email verified successfully".to_string(),
        user,
    }))
}

/// POST /auth/resend-verification - Issue a fresh verification token
///
/// The response is identical whether or not the email is registered.
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(req): Json<ResendVerificationRequest>,
) -> Result<Json<ResendVerificationResponse>, ApiError> {
    req.validate()?;

    let token = state.auth_service.resend_verification(&req.email).await?;

    Ok(Json(ResendVerificationResponse {
        ok: true,
        message: "If the email exists, a verification link has been sent".to_string(),
        email_verification_token: token,
    }))
}

/// PUT /auth/fcm-token - Update the push-token binding of a session
pub async fn update_fcm_token(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(req): Json<UpdateFcmTokenRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    req.validate()?;

    state
        .auth_service
        .update_fcm_token(req.session_id, &req.fcm_token)
        .await?;

    Ok(Json(OkResponse { ok: true }))
}
