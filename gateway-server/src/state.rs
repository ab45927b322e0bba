// gateway-server/src/state.rs
use actix::Addr;
use common::{Config, CredentialVerifier, RuntimeMarkers};
use crate::admin_sessions::AdminSessionRegistry;
use crate::nonce_registry::NonceRegistryActor;
use crate::orchestrator::Orchestrator;
use crate::reconciler::Reconciler;

/// Everything handlers share, registered once as `web::Data<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// `None` when no signing secret could be resolved; wallet login then
    /// answers 500 while the rest of the gateway keeps working.
    pub verifier: Option<CredentialVerifier>,
    /// Header/query wallet identity accepted without a token
    pub dev_fallback: bool,
    pub nonces: Addr<NonceRegistryActor>,
    pub admin_sessions: Addr<AdminSessionRegistry>,
    pub orchestrator: Orchestrator,
    pub reconciler: Reconciler,
}

impl AppState {
    pub fn new(
        config: Config,
        markers: &RuntimeMarkers,
        nonces: Addr<NonceRegistryActor>,
        admin_sessions: Addr<AdminSessionRegistry>,
        reconciler: Reconciler,
    ) -> Self {
        let verifier = match CredentialVerifier::from_config(&config.auth, markers) {
            Ok(verifier) => {
                tracing::info!("Bearer credentials signed with {:?} secret", verifier.source());
                Some(verifier)
            },
            Err(e) => {
                tracing::error!("Wallet login disabled: {}", e);
                None
            },
        };

        let dev_fallback = markers.dev_fallback_enabled(config.auth.dev_fallback);
        if dev_fallback {
            tracing::warn!("Dev wallet fallback enabled: unauthenticated address headers are trusted");
        }

        Self {
            orchestrator: Orchestrator::new(config.toolkit.clone()),
            config,
            verifier,
            dev_fallback,
            nonces,
            admin_sessions,
            reconciler,
        }
    }
}
