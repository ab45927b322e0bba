// gateway-server/src/nonce_registry.rs
use actix::{Actor, AsyncContext, Context, Handler, Message, MessageResult};
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use common::models::auth::NonceChallenge;
use common::Address;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use crate::utils::token::{constant_time_eq, generate_nonce};

// Default nonce TTL in seconds (10 minutes)
const DEFAULT_NONCE_TTL: i64 = 600;

/// Actor message: Issue a fresh challenge nonce for an address
#[derive(Message)]
#[rtype(result = "NonceChallenge")]
pub struct IssueNonce {
    pub address: Address,
}

/// Actor message: Consume the outstanding nonce for an address.
/// Returns the `issuedAt` stamp the nonce was issued with.
#[derive(Message)]
#[rtype(result = "Result<String, NonceRejection>")]
pub struct ConsumeNonce {
    pub address: Address,
    pub nonce: String,
}

/// Actor message: Drop expired nonces
#[derive(Message)]
#[rtype(result = "usize")]
pub struct SweepExpiredNonces;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NonceRejection {
    #[error("no outstanding nonce")]
    Unknown,
    #[error("nonce expired")]
    Expired,
    #[error("nonce mismatch")]
    Mismatch,
}

#[derive(Debug, Clone)]
struct PendingNonce {
    nonce: String,
    issued_at: String,
    expires_at: DateTime<Utc>,
}

/// Single-use challenge store: address -> nonce -> expiry.
///
/// One outstanding nonce per address; issuing again replaces it, and any
/// consume attempt removes it, successful or not.
pub struct NonceRegistryActor {
    pending: Arc<DashMap<Address, PendingNonce>>,
    // Nonce TTL in seconds
    nonce_ttl: i64,
    // Sweep interval in seconds
    sweep_interval: u64,
}

impl Default for NonceRegistryActor {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceRegistryActor {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            nonce_ttl: DEFAULT_NONCE_TTL,
            sweep_interval: 60,
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: i64) -> Self {
        self.nonce_ttl = ttl_seconds;
        self
    }

    fn sweep(&mut self) -> usize {
        let now = Utc::now();
        let before = self.pending.len();
        self.pending.retain(|_, pending| pending.expires_at > now);
        before.saturating_sub(self.pending.len())
    }
}

impl Actor for NonceRegistryActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("NonceRegistryActor started with TTL: {}s", self.nonce_ttl);

        ctx.run_interval(Duration::from_secs(self.sweep_interval), |act, _ctx| {
            let swept = act.sweep();
            if swept > 0 {
                tracing::debug!("Swept {} expired nonces", swept);
            }
        });
    }
}

impl Handler<IssueNonce> for NonceRegistryActor {
    type Result = MessageResult<IssueNonce>;

    fn handle(&mut self, msg: IssueNonce, _ctx: &mut Self::Context) -> Self::Result {
        let now = Utc::now();
        let nonce = generate_nonce();
        let issued_at = now.to_rfc3339_opts(SecondsFormat::Millis, true);

        let replaced = self
            .pending
            .insert(
                msg.address.clone(),
                PendingNonce {
                    nonce: nonce.clone(),
                    issued_at: issued_at.clone(),
                    expires_at: now + ChronoDuration::seconds(self.nonce_ttl),
                },
            )
            .is_some();

        tracing::debug!("Issued nonce for {} (replaced previous: {})", msg.address, replaced);

        MessageResult(NonceChallenge {
            address: msg.address,
            nonce,
            issued_at,
        })
    }
}

impl Handler<ConsumeNonce> for NonceRegistryActor {
    type Result = Result<String, NonceRejection>;

    fn handle(&mut self, msg: ConsumeNonce, _ctx: &mut Self::Context) -> Self::Result {
        let (_, pending) = self.pending.remove(&msg.address).ok_or(NonceRejection::Unknown)?;

        if pending.expires_at <= Utc::now() {
            return Err(NonceRejection::Expired);
        }
        if !constant_time_eq(&pending.nonce, msg.nonce.trim()) {
            return Err(NonceRejection::Mismatch);
        }

        Ok(pending.issued_at)
    }
}

impl Handler<SweepExpiredNonces> for NonceRegistryActor {
    type Result = MessageResult<SweepExpiredNonces>;

    fn handle(&mut self, _msg: SweepExpiredNonces, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.sweep())
    }
}
