// gateway-server/src/admin_sessions.rs
use actix::{Actor, AsyncContext, Context, Handler, Message, MessageResult};
use common::models::session::{AdminSession, SessionResult};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use crate::utils::token::{constant_time_eq, create_session_token};

/// Admin sessions last 7 days, the same as the cookie max-age
pub const ADMIN_SESSION_TTL: i64 = 7 * 24 * 3600;

/// Actor message: Open a session for an operator who presented the PIN
#[derive(Message)]
#[rtype(result = "String")]
pub struct CreateAdminSession {
    pub secret_epoch: String,
}

/// Actor message: Check a cookie token against the current PIN epoch
#[derive(Message)]
#[rtype(result = "SessionResult")]
pub struct CheckAdminSession {
    pub session_token: String,
    pub secret_epoch: String,
}

/// Actor message: Revoke a session (logout)
#[derive(Message)]
#[rtype(result = "bool")]
pub struct RevokeAdminSession {
    pub session_token: String,
}

/// Actor message: Clean up expired sessions
#[derive(Message)]
#[rtype(result = "usize")]
pub struct CleanupExpiredSessions;

/// Server-side admin sessions, one random token per login.
pub struct AdminSessionRegistry {
    // Map from session token to session data
    sessions: Arc<DashMap<String, AdminSession>>,
    // Session TTL in seconds
    session_ttl: i64,
    // Cleanup interval in seconds
    cleanup_interval: u64,
}

impl Default for AdminSessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdminSessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            session_ttl: ADMIN_SESSION_TTL,
            cleanup_interval: 3600, // Run cleanup every hour
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: i64) -> Self {
        self.session_ttl = ttl_seconds;
        self
    }

    /// Remove expired sessions
    fn cleanup_sessions(&mut self) -> usize {
        let before = self.sessions.len();
        let ttl = self.session_ttl;
        self.sessions.retain(|_, session| !session.is_expired(ttl));
        before.saturating_sub(self.sessions.len())
    }
}

impl Actor for AdminSessionRegistry {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("AdminSessionRegistry started with TTL: {}s", self.session_ttl);

        // Schedule periodic session cleanup
        ctx.run_interval(Duration::from_secs(self.cleanup_interval), |act, _ctx| {
            let expired_count = act.cleanup_sessions();
            if expired_count > 0 {
                tracing::info!("Cleaned up {} expired admin sessions", expired_count);
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("AdminSessionRegistry stopped with {} live sessions", self.sessions.len());
    }
}

impl Handler<CreateAdminSession> for AdminSessionRegistry {
    type Result = MessageResult<CreateAdminSession>;

    fn handle(&mut self, msg: CreateAdminSession, _ctx: &mut Self::Context) -> Self::Result {
        let session_token = create_session_token();
        let session = AdminSession::new(session_token.clone(), msg.secret_epoch);

        self.sessions.insert(session_token.clone(), session);
        tracing::info!("Opened admin session ({} live)", self.sessions.len());

        MessageResult(session_token)
    }
}

impl Handler<CheckAdminSession> for AdminSessionRegistry {
    type Result = MessageResult<CheckAdminSession>;

    fn handle(&mut self, msg: CheckAdminSession, _ctx: &mut Self::Context) -> Self::Result {
        let result = match self.sessions.get_mut(&msg.session_token) {
            Some(mut entry) => {
                let session = entry.value_mut();
                if session.is_expired(self.session_ttl) {
                    SessionResult::Expired
                } else if !constant_time_eq(&session.secret_epoch, &msg.secret_epoch) {
                    SessionResult::Stale
                } else {
                    session.update_activity();
                    SessionResult::Valid
                }
            },
            None => SessionResult::NotFound,
        };

        // Dead sessions are dropped on sight.
        if matches!(result, SessionResult::Expired | SessionResult::Stale) {
            tracing::debug!("Dropping admin session: {:?}", result);
            self.sessions.remove(&msg.session_token);
        }

        MessageResult(result)
    }
}

impl Handler<RevokeAdminSession> for AdminSessionRegistry {
    type Result = MessageResult<RevokeAdminSession>;

    fn handle(&mut self, msg: RevokeAdminSession, _ctx: &mut Self::Context) -> Self::Result {
        let removed = self.sessions.remove(&msg.session_token).is_some();
        if removed {
            tracing::info!("Revoked admin session");
        }
        MessageResult(removed)
    }
}

impl Handler<CleanupExpiredSessions> for AdminSessionRegistry {
    type Result = MessageResult<CleanupExpiredSessions>;

    fn handle(&mut self, _msg: CleanupExpiredSessions, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.cleanup_sessions())
    }
}
