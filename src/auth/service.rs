//! Authentication service
//!
//! Composes the attempt guard, session rotator and token codec into the
//! public auth operations: register, login, refresh, logout, push-token
//! update and the email-verification sub-flow.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use super::crypto::{hash_password, random_hex_token, verify_password};
use super::guard::{remaining_minutes, AttemptGuard, LockoutPolicy};
use super::jwt::{JwtError, TokenCodec};
use super::repo::{AuthRepo, NewUser};
use super::session::{SessionRotator, TokenPair};
use super::AuthError;
use crate::config::AuthConfig;
use crate::models::{Session, UserResponse};

/// Email-verification tokens are 32 random bytes, hex-encoded.
const VERIFICATION_TOKEN_BYTES: usize = 32;

/// Registration parameters
#[derive(Debug, Clone)]
pub struct RegisterParams {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
}

/// Login parameters
#[derive(Debug, Clone)]
pub struct LoginParams {
    pub email: String,
    pub password: String,
    pub device_id: Option<String>,
    pub fcm_token: Option<String>,
    pub ip_address: String,
    pub user_agent: String,
}

/// Result of a successful registration
#[derive(Debug)]
pub struct RegisterOutcome {
    pub user: UserResponse,
    pub tokens: TokenPair,
    /// Raw verification token, present only when the deployment exposes it.
    pub verification_token: Option<String>,
}

/// Result of a successful login
#[derive(Debug)]
pub struct LoginOutcome {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    repo: Arc<dyn AuthRepo>,
    guard: AttemptGuard,
    rotator: SessionRotator,
    codec: TokenCodec,
    bcrypt_cost: u32,
    verification_token_ttl: Duration,
    expose_verification_token: bool,
    dummy_hash: String,
}

impl AuthService {
    /// Create a new AuthService over a credential store.
    pub fn new(repo: Arc<dyn AuthRepo>, config: &AuthConfig) -> Self {
        let codec = TokenCodec::new(config);

        // Unknown-email logins verify against this hash so the miss path
        // costs the same as a real comparison.
        let dummy_hash =
            hash_password("lifeline.invalid.credential", config.bcrypt_cost).unwrap_or_default();

        Self {
            guard: AttemptGuard::new(repo.clone(), LockoutPolicy::from_config(config)),
            rotator: SessionRotator::new(repo.clone(), codec.clone()),
            repo,
            codec,
            bcrypt_cost: config.bcrypt_cost,
            verification_token_ttl: config.verification_token_ttl,
            expose_verification_token: config.expose_verification_token,
            dummy_hash,
        }
    }

    /// Register a new account and immediately establish a session so the
    /// client does not need a separate login call.
    pub async fn register(&self, params: RegisterParams) -> Result<RegisterOutcome, AuthError> {
        if self
            .repo
            .find_user_by_email(&params.email)
            .await?
            .is_some()
        {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password(&params.password, self.bcrypt_cost)
            .map_err(|e| AuthError::Hash(e.to_string()))?;

        // A concurrent registration of the same email loses against the
        // unique constraint and surfaces as EmailTaken here.
        let user = self
            .repo
            .create_user(NewUser {
                email: params.email,
                password_hash,
                full_name: params.full_name,
                phone: params.phone,
            })
            .await?;

        let verification_token = random_hex_token(VERIFICATION_TOKEN_BYTES);
        self.repo
            .create_verification_token(
                user.id,
                &verification_token,
                Utc::now() + self.verification_token_ttl,
            )
            .await?;

        let tokens = self.rotator.open_session(user.id, None, None).await?;

        Ok(RegisterOutcome {
            user: user.into(),
            tokens,
            verification_token: self
                .expose_verification_token
                .then_some(verification_token),
        })
    }

    /// Verify credentials and open a session.
    ///
    /// Unknown email and wrong password take the same path: both write an
    /// audit row and both fail with the same error, so neither the response
    /// nor its timing reveals whether the account exists.
    pub async fn login(&self, params: LoginParams) -> Result<LoginOutcome, AuthError> {
        let LoginParams {
            email,
            password,
            device_id,
            fcm_token,
            ip_address,
            user_agent,
        } = params;

        let user = self.repo.find_user_by_email(&email).await?;

        // Lock check precedes password verification.
        if let Some(user) = &user {
            self.guard.check_lock(user).await?;
        }

        let stored_hash = user
            .as_ref()
            .map(|u| u.password_hash.as_str())
            .unwrap_or(&self.dummy_hash);
        let password_matches = verify_password(&password, stored_hash);

        if user.is_none() || !password_matches {
            let locked_until = self
                .guard
                .record_failure(user.as_ref(), &email, &ip_address, &user_agent)
                .await?;

            if let Some(until) = locked_until {
                return Err(AuthError::AccountLocked {
                    minutes_remaining: remaining_minutes(until, Utc::now()),
                });
            }
            return Err(AuthError::InvalidCredentials);
        }

        let Some(user) = user else {
            return Err(AuthError::InvalidCredentials);
        };

        self.guard
            .record_success(&user, &email, &ip_address, &user_agent)
            .await;

        let tokens = self
            .rotator
            .open_session(user.id, device_id, fcm_token)
            .await?;

        Ok(LoginOutcome {
            user: user.into(),
            tokens,
        })
    }

    /// Rotate a refresh token into a new token pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        self.rotator.refresh(refresh_token).await
    }

    /// Revoke the session behind a refresh token. Always succeeds.
    pub async fn logout(&self, refresh_token: &str) {
        self.rotator.close_session(refresh_token).await;
    }

    /// Update the push-token binding of a live session in place. Does not
    /// rotate the refresh token.
    pub async fn update_fcm_token(
        &self,
        session_id: Uuid,
        fcm_token: &str,
    ) -> Result<Session, AuthError> {
        let session = self
            .repo
            .find_session_by_id(session_id)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if session.revoked_at.is_some() {
            return Err(AuthError::SessionRevoked);
        }

        Ok(self
            .repo
            .update_session_fcm_token(session_id, fcm_token)
            .await?)
    }

    /// Consume an email-verification token, flipping `email_verified` exactly once.
    pub async fn verify_email(&self, token: &str) -> Result<UserResponse, AuthError> {
        let user = self
            .repo
            .find_user_by_verification_token(token)
            .await?
            .ok_or(AuthError::InvalidVerificationToken)?;

        if user.email_verified {
            return Err(AuthError::AlreadyVerified);
        }

        let expired = user
            .email_verification_expires
            .map(|at| at <= Utc::now())
            .unwrap_or(true);
        if expired {
            return Err(AuthError::VerificationTokenExpired);
        }

        self.repo.mark_email_verified(user.id).await?;

        let mut response: UserResponse = user.into();
        response.email_verified = true;
        Ok(response)
    }

    /// Issue a fresh verification token for an unverified account.
    ///
    /// Unknown emails return `Ok(None)` so the endpoint cannot be used to
    /// probe which addresses are registered.
    pub async fn resend_verification(&self, email: &str) -> Result<Option<String>, AuthError> {
        let Some(user) = self.repo.find_user_by_email(email).await? else {
            return Ok(None);
        };

        if user.email_verified {
            return Err(AuthError::AlreadyVerified);
        }

        let token = random_hex_token(VERIFICATION_TOKEN_BYTES);
        self.repo
            .create_verification_token(user.id, &token, Utc::now() + self.verification_token_ttl)
            .await?;

        Ok(self.expose_verification_token.then_some(token))
    }

    /// Verify an access token for the bearer-auth extractor.
    pub fn verify_access(&self, token: &str) -> Result<Uuid, JwtError> {
        self.codec.verify_access(token)
    }
}
