//! Brute-force defense: login-attempt auditing and account lockout
//!
//! Every login call appends an audit row, whether or not the email maps to a
//! real account, so enumeration attempts leave the same trail as ordinary
//! failures. Lockout state lives on the user row and is cleared lazily at the
//! next check; there is no background sweep.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::repo::{AuthRepo, NewLoginAttempt};
use super::AuthError;
use crate::config::AuthConfig;
use crate::models::User;

/// Lockout thresholds
#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    /// Failures within the window that trigger a lock
    pub max_failures: i64,
    /// Rolling window over which failures are counted
    pub window: Duration,
    /// How long a triggered lock lasts
    pub lock_duration: Duration,
}

impl LockoutPolicy {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            max_failures: config.max_failed_logins,
            window: config.failed_login_window,
            lock_duration: config.lockout_duration,
        }
    }
}

/// Tracks failed logins and enforces temporary account lockout.
#[derive(Clone)]
pub struct AttemptGuard {
    repo: Arc<dyn AuthRepo>,
    policy: LockoutPolicy,
}

impl AttemptGuard {
    pub fn new(repo: Arc<dyn AuthRepo>, policy: LockoutPolicy) -> Self {
        Self { repo, policy }
    }

    /// Reject while the account lock is live; clear a lapsed lock in passing.
    ///
    /// Runs before password verification so a locked account never pays for
    /// (or leaks timing about) a bcrypt comparison.
    pub async fn check_lock(&self, user: &User) -> Result<(), AuthError> {
        let Some(until) = user.account_locked_until else {
            return Ok(());
        };

        let now = Utc::now();
        if until > now {
            return Err(AuthError::AccountLocked {
                minutes_remaining: remaining_minutes(until, now),
            });
        }

        // Lapsed lock: lazy unlock at the point of use.
        self.repo.unlock_account(user.id).await?;
        Ok(())
    }

    /// Record a failed attempt and lock the account once the rolling-window
    /// count reaches the threshold. Returns the lock deadline when a lock was
    /// applied on this call.
    pub async fn record_failure(
        &self,
        user: Option<&User>,
        email: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<Option<DateTime<Utc>>, AuthError> {
        self.record(user.map(|u| u.id), email, ip_address, user_agent, false)
            .await;

        // Unknown emails are audited but there is no account to lock.
        let Some(user) = user else {
            return Ok(None);
        };

        let now = Utc::now();
        let failures = self
            .repo
            .count_recent_failed_attempts(email, now - self.policy.window)
            .await?;

        if failures >= self.policy.max_failures {
            let until = now + self.policy.lock_duration;
            self.repo.lock_account(user.id, until).await?;
            tracing::warn!(
                user_id = %user.id,
                failures,
                locked_until = %until,
                "account locked after repeated failed logins"
            );
            return Ok(Some(until));
        }

        Ok(None)
    }

    /// Record a successful attempt. Does not reset the failure count; only
    /// the passage of the rolling window does.
    pub async fn record_success(
        &self,
        user: &User,
        email: &str,
        ip_address: &str,
        user_agent: &str,
    ) {
        self.record(Some(user.id), email, ip_address, user_agent, true)
            .await;
    }

    async fn record(
        &self,
        user_id: Option<Uuid>,
        email: &str,
        ip_address: &str,
        user_agent: &str,
        successful: bool,
    ) {
        let attempt = NewLoginAttempt {
            user_id,
            email: email.to_string(),
            ip_address: ip_address.to_string(),
            user_agent: user_agent.to_string(),
            successful,
        };

        // A lost audit row must not mask the auth decision itself.
        if let Err(e) = self.repo.record_login_attempt(attempt).await {
            tracing::warn!(error = %e, email, "failed to record login attempt");
        }
    }
}

/// Whole minutes until `until`, rounded up, never less than 1.
pub(crate) fn remaining_minutes(until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (until - now).num_seconds().max(0);
    ((seconds + 59) / 60).max(1)
}
