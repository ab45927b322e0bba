// common/src/models/session.rs
use chrono::{DateTime, Utc};

/// Server-side record behind an `admin_session` cookie
#[derive(Debug, Clone)]
pub struct AdminSession {
    /// Random token carried in the cookie
    pub session_token: String,
    /// Hash of the admin PIN the session was opened with
    pub secret_epoch: String,
    /// Timestamp when the session was created
    pub created_at: DateTime<Utc>,
    /// Timestamp of last operator activity
    pub last_active: DateTime<Utc>,
}

impl AdminSession {
    pub fn new(session_token: String, secret_epoch: String) -> Self {
        let now = Utc::now();
        Self {
            session_token,
            secret_epoch,
            created_at: now,
            last_active: now,
        }
    }

    /// Update session activity timestamp
    pub fn update_activity(&mut self) {
        self.last_active = Utc::now();
    }

    /// Sessions expire a fixed time after login, matching the cookie max-age.
    pub fn is_expired(&self, ttl_seconds: i64) -> bool {
        let age = Utc::now().signed_duration_since(self.created_at);
        age.num_seconds() > ttl_seconds
    }
}

/// Result of session lookups
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionResult {
    Valid,
    NotFound,
    Expired,
    /// The admin PIN changed since the session was opened
    Stale,
}
