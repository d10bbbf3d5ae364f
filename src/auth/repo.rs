//! Credential store: the persistence boundary of the auth subsystem
//!
//! The [`AuthRepo`] trait is the only place the rest of the auth code touches
//! storage. [`PgAuthRepo`] is the PostgreSQL implementation; tests use an
//! in-memory one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Session, User};

/// Credential store errors
#[derive(Error, Debug)]
pub enum RepoError {
    #[error("Duplicate value for unique field")]
    Duplicate,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            // A duplicate-email race loses against the unique constraint and
            // surfaces as a conflict, not a server error.
            if db.is_unique_violation() {
                return RepoError::Duplicate;
            }
        }
        RepoError::Database(e.to_string())
    }
}

/// Parameters for creating a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
}

/// Parameters for creating a session
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: Uuid,
    pub device_id: Option<String>,
    pub fcm_token: Option<String>,
    pub refresh_token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Parameters for the append-only login audit log
#[derive(Debug, Clone)]
pub struct NewLoginAttempt {
    pub user_id: Option<Uuid>,
    pub email: String,
    pub ip_address: String,
    pub user_agent: String,
    pub successful: bool,
}

/// Storage operations required by the auth subsystem.
#[async_trait]
pub trait AuthRepo: Send + Sync {
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;

    async fn create_session(&self, session: NewSession) -> Result<Session, RepoError>;

    async fn update_session_refresh_hash(
        &self,
        session_id: Uuid,
        refresh_token_hash: &str,
    ) -> Result<(), RepoError>;

    async fn update_session_fcm_token(
        &self,
        session_id: Uuid,
        fcm_token: &str,
    ) -> Result<Session, RepoError>;

    async fn find_session_by_id(&self, session_id: Uuid) -> Result<Option<Session>, RepoError>;

    /// Revoke a session. Idempotent: returns the number of rows actually
    /// transitioned (0 when the session was already revoked or absent), so
    /// callers can detect having lost a concurrent rotation.
    async fn revoke_session(&self, session_id: Uuid) -> Result<u64, RepoError>;

    async fn revoke_all_sessions_for_user(&self, user_id: Uuid) -> Result<u64, RepoError>;

    async fn record_login_attempt(&self, attempt: NewLoginAttempt) -> Result<(), RepoError>;

    async fn count_recent_failed_attempts(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, RepoError>;

    async fn lock_account(&self, user_id: Uuid, until: DateTime<Utc>) -> Result<(), RepoError>;

    async fn unlock_account(&self, user_id: Uuid) -> Result<(), RepoError>;

    async fn create_verification_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepoError>;

    async fn find_user_by_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<User>, RepoError>;

    async fn mark_email_verified(&self, user_id: Uuid) -> Result<(), RepoError>;
}

/// PostgreSQL credential store
#[derive(Clone)]
pub struct PgAuthRepo {
    pool: PgPool,
}

impl PgAuthRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthRepo for PgAuthRepo {
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let created: User = sqlx::query_as(
            r#"
            INSERT INTO users (id, email, password_hash, full_name, phone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, password_hash, full_name, phone, email_verified,
                      email_verification_token, email_verification_expires,
                      account_locked_until, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.phone)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let user: Option<User> = sqlx::query_as(
            r#"
            SELECT id, email, password_hash, full_name, phone, email_verified,
                   email_verification_token, email_verification_expires,
                   account_locked_until, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create_session(&self, session: NewSession) -> Result<Session, RepoError> {
        let created: Session = sqlx::query_as(
            r#"
            INSERT INTO sessions (id, user_id, device_id, fcm_token, refresh_token_hash, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, device_id, fcm_token, refresh_token_hash,
                      expires_at, revoked_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session.user_id)
        .bind(&session.device_id)
        .bind(&session.fcm_token)
        .bind(&session.refresh_token_hash)
        .bind(session.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update_session_refresh_hash(
        &self,
        session_id: Uuid,
        refresh_token_hash: &str,
    ) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            UPDATE sessions
            SET refresh_token_hash = $1
            WHERE id = $2
            "#,
        )
        .bind(refresh_token_hash)
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_session_fcm_token(
        &self,
        session_id: Uuid,
        fcm_token: &str,
    ) -> Result<Session, RepoError> {
        let session: Session = sqlx::query_as(
            r#"
            UPDATE sessions
            SET fcm_token = $1
            WHERE id = $2
            RETURNING id, user_id, device_id, fcm_token, refresh_token_hash,
                      expires_at, revoked_at, created_at
            "#,
        )
        .bind(fcm_token)
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    async fn find_session_by_id(&self, session_id: Uuid) -> Result<Option<Session>, RepoError> {
        let session: Option<Session> = sqlx::query_as(
            r#"
            SELECT id, user_id, device_id, fcm_token, refresh_token_hash,
                   expires_at, revoked_at, created_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn revoke_session(&self, session_id: Uuid) -> Result<u64, RepoError> {
        // Conditional update: the freshest committed state decides who wins a
        // concurrent rotation race.
        let rows_affected = sqlx::query(
            r#"
            UPDATE sessions
            SET revoked_at = NOW()
            WHERE id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected)
    }

    async fn revoke_all_sessions_for_user(&self, user_id: Uuid) -> Result<u64, RepoError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE sessions
            SET revoked_at = NOW()
            WHERE user_id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected)
    }

    async fn record_login_attempt(&self, attempt: NewLoginAttempt) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO login_attempts (id, user_id, email, ip_address, user_agent, successful)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(attempt.user_id)
        .bind(&attempt.email)
        .bind(&attempt.ip_address)
        .bind(&attempt.user_agent)
        .bind(attempt.successful)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count_recent_failed_attempts(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, RepoError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM login_attempts
            WHERE email = $1 AND successful = FALSE AND created_at >= $2
            "#,
        )
        .bind(email)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn lock_account(&self, user_id: Uuid, until: DateTime<Utc>) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            UPDATE users
            SET account_locked_until = $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(until)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn unlock_account(&self, user_id: Uuid) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            UPDATE users
            SET account_locked_until = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_verification_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            UPDATE users
            SET email_verification_token = $1, email_verification_expires = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(token)
        .bind(expires_at)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_user_by_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<User>, RepoError> {
        let user: Option<User> = sqlx::query_as(
            r#"
            SELECT id, email, password_hash, full_name, phone, email_verified,
                   email_verification_token, email_verification_expires,
                   account_locked_until, created_at, updated_at
            FROM users
            WHERE email_verification_token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn mark_email_verified(&self, user_id: Uuid) -> Result<(), RepoError> {
        // The token column is kept so a repeat submission resolves to the
        // user and fails as already-verified rather than as unknown.
        sqlx::query(
            r#"
            UPDATE users
            SET email_verified = TRUE, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
