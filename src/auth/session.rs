//! Session lifecycle: two-phase creation, one-time-use rotation, reuse detection
//!
//! A session row holds the sha256 digest of exactly one live refresh token.
//! Each successful refresh revokes the current row and chains to a fresh one,
//! so a captured token is single-use: replaying it after rotation is treated
//! as a theft signal and revokes every session the user has.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::crypto::{constant_time_eq, sha256_hex};
use super::jwt::{JwtError, TokenCodec};
use super::repo::{AuthRepo, NewSession};
use super::AuthError;

/// Placeholder stored between inserting a session row and persisting the real
/// token digest. Not a hex digest, so it can never match a presented token.
const PENDING_HASH: &str = "pending";

/// A freshly minted access/refresh token pair
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Session lifecycle state machine.
#[derive(Clone)]
pub struct SessionRotator {
    repo: Arc<dyn AuthRepo>,
    codec: TokenCodec,
}

impl SessionRotator {
    pub fn new(repo: Arc<dyn AuthRepo>, codec: TokenCodec) -> Self {
        Self { repo, codec }
    }

    /// Create a session and mint its token pair.
    ///
    /// Two-phase: the session id must exist before it can be embedded in the
    /// signed refresh token, so the row is inserted with [`PENDING_HASH`] and
    /// finalized with the real digest once the token is signed.
    pub async fn open_session(
        &self,
        user_id: Uuid,
        device_id: Option<String>,
        fcm_token: Option<String>,
    ) -> Result<TokenPair, AuthError> {
        let expires_at = Utc::now() + self.codec.refresh_ttl();

        let session = self
            .repo
            .create_session(NewSession {
                user_id,
                device_id,
                fcm_token,
                refresh_token_hash: PENDING_HASH.to_string(),
                expires_at,
            })
            .await?;

        let refresh_token = self
            .codec
            .sign_refresh(user_id, session.id)
            .map_err(token_error)?;
        self.repo
            .update_session_refresh_hash(session.id, &sha256_hex(&refresh_token))
            .await?;

        let access_token = self.codec.sign_access(user_id).map_err(token_error)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Rotate a session: consume the presented refresh token, revoke its row
    /// and chain to a new session carrying the same device binding.
    pub async fn refresh(&self, presented: &str) -> Result<TokenPair, AuthError> {
        let claims = self
            .codec
            .verify_refresh(presented)
            .map_err(|_| AuthError::InvalidToken)?;

        // Absent session and bad signature are indistinguishable to the caller.
        let session = self
            .repo
            .find_session_by_id(claims.session_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        // A forged or stale token carrying a live session id fails here.
        if !constant_time_eq(&session.refresh_token_hash, &sha256_hex(presented)) {
            return Err(AuthError::InvalidToken);
        }

        if session.revoked_at.is_some() {
            // This token was already consumed by a rotation or logout:
            // someone is replaying it.
            return Err(self.contain_reuse(claims.user_id, session.id).await);
        }

        if session.expires_at <= Utc::now() {
            self.repo.revoke_session(session.id).await?;
            return Err(AuthError::TokenExpired);
        }

        // The conditional revoke decides the race between a retrying client
        // and a replayed token: losing it means another rotation committed
        // first, which is the same signal as reuse.
        let revoked = self.repo.revoke_session(session.id).await?;
        if revoked == 0 {
            return Err(self.contain_reuse(claims.user_id, session.id).await);
        }

        self.open_session(claims.user_id, session.device_id, session.fcm_token)
            .await
    }

    /// Best-effort logout. An unverifiable token is already as good as logged
    /// out, and a failed revoke is swallowed; this never errors.
    pub async fn close_session(&self, presented: &str) {
        let Ok(claims) = self.codec.verify_refresh(presented) else {
            return;
        };

        if let Err(e) = self.repo.revoke_session(claims.session_id).await {
            tracing::debug!(
                session_id = %claims.session_id,
                error = %e,
                "logout revoke failed; treating session as already closed"
            );
        }
    }

    /// Blast-radius containment for refresh-token reuse: revoke every session
    /// the user has. Logged server-side only; the caller sees a generic
    /// invalid-token failure.
    async fn contain_reuse(&self, user_id: Uuid, session_id: Uuid) -> AuthError {
        tracing::warn!(
            %user_id,
            %session_id,
            "refresh token reuse detected; revoking all sessions for user"
        );

        match self.repo.revoke_all_sessions_for_user(user_id).await {
            Ok(_) => AuthError::ReuseDetected,
            Err(e) => e.into(),
        }
    }
}

fn token_error(e: JwtError) -> AuthError {
    AuthError::Token(e.to_string())
}
