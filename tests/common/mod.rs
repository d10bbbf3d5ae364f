#![allow(dead_code)]

//! Shared test support: an in-memory credential store and a test config.
//!
//! Mirrors the semantics the PostgreSQL store provides, including the
//! conditional revoke (rows transitioned) and unique-email enforcement.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use lifeline_server::auth::{AuthRepo, NewLoginAttempt, NewSession, NewUser, RepoError};
use lifeline_server::config::AuthConfig;
use lifeline_server::models::{LoginAttempt, Session, User};

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    sessions: Vec<Session>,
    attempts: Vec<LoginAttempt>,
}

/// In-memory credential store
#[derive(Clone, Default)]
pub struct MemoryAuthRepo {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryAuthRepo {
    pub fn new() -> Self {
        Self::default()
    }

    // --- inspection helpers for assertions ---

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        let inner = self.inner.lock().unwrap();
        inner.users.iter().find(|u| u.email == email).cloned()
    }

    pub fn user_count(&self) -> usize {
        self.inner.lock().unwrap().users.len()
    }

    pub fn sessions_for_user(&self, user_id: Uuid) -> Vec<Session> {
        let inner = self.inner.lock().unwrap();
        inner
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn session_by_id(&self, session_id: Uuid) -> Option<Session> {
        let inner = self.inner.lock().unwrap();
        inner.sessions.iter().find(|s| s.id == session_id).cloned()
    }

    pub fn attempts_for_email(&self, email: &str) -> Vec<LoginAttempt> {
        let inner = self.inner.lock().unwrap();
        inner
            .attempts
            .iter()
            .filter(|a| a.email == email)
            .cloned()
            .collect()
    }

    // --- mutation helpers for scenario setup ---

    pub fn set_session_expiry(&self, session_id: Uuid, expires_at: DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(session) = inner.sessions.iter_mut().find(|s| s.id == session_id) {
            session.expires_at = expires_at;
        }
    }
}

#[async_trait]
impl AuthRepo for MemoryAuthRepo {
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(RepoError::Duplicate);
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            full_name: user.full_name,
            phone: user.phone,
            email_verified: false,
            email_verification_token: None,
            email_verification_expires: None,
            account_locked_until: None,
            created_at: now,
            updated_at: now,
        };
        inner.users.push(created.clone());
        Ok(created)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        Ok(self.user_by_email(email))
    }

    async fn create_session(&self, session: NewSession) -> Result<Session, RepoError> {
        let mut inner = self.inner.lock().unwrap();
        let created = Session {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            device_id: session.device_id,
            fcm_token: session.fcm_token,
            refresh_token_hash: session.refresh_token_hash,
            expires_at: session.expires_at,
            revoked_at: None,
            created_at: Utc::now(),
        };
        inner.sessions.push(created.clone());
        Ok(created)
    }

    async fn update_session_refresh_hash(
        &self,
        session_id: Uuid,
        refresh_token_hash: &str,
    ) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(session) = inner.sessions.iter_mut().find(|s| s.id == session_id) {
            session.refresh_token_hash = refresh_token_hash.to_string();
        }
        Ok(())
    }

    async fn update_session_fcm_token(
        &self,
        session_id: Uuid,
        fcm_token: &str,
    ) -> Result<Session, RepoError> {
        let mut inner = self.inner.lock().unwrap();
        let session = inner
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| RepoError::Database("session not found".to_string()))?;
        session.fcm_token = Some(fcm_token.to_string());
        Ok(session.clone())
    }

    async fn find_session_by_id(&self, session_id: Uuid) -> Result<Option<Session>, RepoError> {
        Ok(self.session_by_id(session_id))
    }

    async fn revoke_session(&self, session_id: Uuid) -> Result<u64, RepoError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.sessions.iter_mut().find(|s| s.id == session_id) {
            Some(session) if session.revoked_at.is_none() => {
                session.revoked_at = Some(Utc::now());
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn revoke_all_sessions_for_user(&self, user_id: Uuid) -> Result<u64, RepoError> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let mut revoked = 0;
        for session in inner
            .sessions
            .iter_mut()
            .filter(|s| s.user_id == user_id && s.revoked_at.is_none())
        {
            session.revoked_at = Some(now);
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn record_login_attempt(&self, attempt: NewLoginAttempt) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().unwrap();
        inner.attempts.push(LoginAttempt {
            id: Uuid::new_v4(),
            user_id: attempt.user_id,
            email: attempt.email,
            ip_address: attempt.ip_address,
            user_agent: attempt.user_agent,
            successful: attempt.successful,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn count_recent_failed_attempts(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, RepoError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .attempts
            .iter()
            .filter(|a| a.email == email && !a.successful && a.created_at >= since)
            .count() as i64)
    }

    async fn lock_account(&self, user_id: Uuid, until: DateTime<Utc>) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.iter_mut().find(|u| u.id == user_id) {
            user.account_locked_until = Some(until);
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn unlock_account(&self, user_id: Uuid) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.iter_mut().find(|u| u.id == user_id) {
            user.account_locked_until = None;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn create_verification_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.iter_mut().find(|u| u.id == user_id) {
            user.email_verification_token = Some(token.to_string());
            user.email_verification_expires = Some(expires_at);
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn find_user_by_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<User>, RepoError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .iter()
            .find(|u| u.email_verification_token.as_deref() == Some(token))
            .cloned())
    }

    async fn mark_email_verified(&self, user_id: Uuid) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.iter_mut().find(|u| u.id == user_id) {
            user.email_verified = true;
            user.updated_at = Utc::now();
        }
        Ok(())
    }
}

/// Auth config for tests: low bcrypt cost for speed, verification-token echo
/// enabled so flows that need the raw token can obtain it.
pub fn test_config() -> AuthConfig {
    AuthConfig {
        access_secret: "test-access-secret".to_string(),
        refresh_secret: "test-refresh-secret".to_string(),
        access_ttl: Duration::minutes(15),
        refresh_ttl: Duration::days(30),
        bcrypt_cost: 4,
        max_failed_logins: 5,
        failed_login_window: Duration::minutes(15),
        lockout_duration: Duration::minutes(15),
        verification_token_ttl: Duration::hours(24),
        expose_verification_token: true,
    }
}
