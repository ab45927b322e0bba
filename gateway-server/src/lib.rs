// gateway-server/src/lib.rs
pub mod admin;
pub mod admin_sessions;
pub mod api;
pub mod auth;
pub mod deployment;
pub mod error;
pub mod middleware;
pub mod nonce_registry;
pub mod orchestrator;
pub mod reconciler;
pub mod state;
pub mod utils;

use std::sync::Arc;
use std::time::Duration;
use actix::Actor;
use actix_web::web;
use common::{Config, RuntimeMarkers};
use crate::admin_sessions::AdminSessionRegistry;
use crate::nonce_registry::NonceRegistryActor;
use crate::reconciler::{MarketStore, Reconciler, RestMarketStore};
use crate::state::AppState;

pub use crate::error::GatewayError;

/// Start the state actors and wire up the shared application state.
/// Must run inside an actix system.
pub fn build_state(config: Config, markers: &RuntimeMarkers) -> Result<AppState, GatewayError> {
    let store = RestMarketStore::new(
        config.datastore.table.clone(),
        Duration::from_secs(config.datastore.timeout_secs),
    )
    .map_err(|e| GatewayError::Internal(format!("datastore client: {}", e)))?;

    Ok(build_state_with_store(config, markers, Arc::new(store)))
}

/// As [`build_state`], with the datastore supplied by the caller.
pub fn build_state_with_store(config: Config, markers: &RuntimeMarkers, store: Arc<dyn MarketStore>) -> AppState {
    let nonces = NonceRegistryActor::new()
        .with_ttl(config.auth.nonce_ttl_secs)
        .start();
    let admin_sessions = AdminSessionRegistry::new().start();
    let reconciler = Reconciler::new(store, config.datastore.clone());

    AppState::new(config, markers, nonces, admin_sessions, reconciler)
}

/// Register every route. The admin console mounts under the configured path.
pub fn configure_app(cfg: &mut web::ServiceConfig, admin_base: &str) {
    api::configure(cfg);
    admin::configure(cfg, admin_base);
}
