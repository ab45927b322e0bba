// gateway-server/tests/support/mod.rs
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use common::{Config, RuntimeMarkers};
use gateway_server::build_state_with_store;
use gateway_server::reconciler::{DatastoreCredentials, MarketStore, MarketUpdate, PickTiming, StoreError};
use gateway_server::state::AppState;

pub const ADMIN_PIN: &str = "2468";
pub const MARKET: &str = "0x00000000000000000000000000000000000000ab";
pub const YES_SHARE: &str = "0x00000000000000000000000000000000000000a1";
pub const NO_SHARE: &str = "0x00000000000000000000000000000000000000a2";

/// Prints the result line the way the deploy script does, after some noise.
pub const DEPLOY_OK: &str = r#"echo "compiling..."; echo "deploying $NAME_PREFIX ($FEE_BPS bps)" >&2;
echo 'TOOLKIT_RESULT {"success":true,"marketAddress":"0x00000000000000000000000000000000000000AB","yesShareAddress":"0x00000000000000000000000000000000000000a1","noShareAddress":"0x00000000000000000000000000000000000000a2"}'"#;

/// In-memory datastore recording every write and the credentials of every call
#[derive(Default)]
pub struct MemoryStore {
    pub fail_writes: bool,
    pub timing: Option<PickTiming>,
    pub writes: Mutex<Vec<(String, MarketUpdate)>>,
    pub creds_seen: Mutex<Vec<DatastoreCredentials>>,
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn fetch_timing(
        &self,
        creds: &DatastoreCredentials,
        _record_id: &str,
    ) -> Result<Option<PickTiming>, StoreError> {
        self.creds_seen.lock().unwrap().push(creds.clone());
        Ok(self.timing.clone())
    }

    async fn record_deployment(
        &self,
        creds: &DatastoreCredentials,
        record_id: &str,
        update: &MarketUpdate,
    ) -> Result<(), StoreError> {
        self.creds_seen.lock().unwrap().push(creds.clone());
        if self.fail_writes {
            return Err(StoreError::Status {
                status: 500,
                body: "relation \"picks\" is locked".to_string(),
            });
        }
        self.writes
            .lock()
            .unwrap()
            .push((record_id.to_string(), update.clone()));
        Ok(())
    }
}

/// Gateway config whose toolkit is `sh -c <script>`.
pub fn config_with_toolkit(script: &str) -> Config {
    let mut config = Config::default();
    config.auth.secret = Some("integration-test-secret".to_string());
    config.auth.admin_pin = Some(ADMIN_PIN.to_string());
    config.toolkit.program = "sh".to_string();
    config.toolkit.base_args = vec!["-c".to_string(), script.to_string(), "toolkit".to_string()];
    config.toolkit.timeout_secs = 20;
    config.toolkit.rpc_url = Some("http://127.0.0.1:8545".to_string());
    config.toolkit.deployer_pk = Some("0x01".to_string());
    config.toolkit.escrow_asset = Some("0x00000000000000000000000000000000000000ee".to_string());
    config.datastore.url = Some("https://db.example.co".to_string());
    config.datastore.key = Some("service-role-key".to_string());
    config
}

pub fn state(config: Config, store: Arc<MemoryStore>) -> AppState {
    build_state_with_store(config, &RuntimeMarkers::default(), store)
}

/// Builds the full app around `$state`.
macro_rules! app {
    ($state:expr) => {{
        let state = $state;
        let base = state.config.admin_base_path();
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new(state))
                .configure(|cfg| gateway_server::configure_app(cfg, &base)),
        )
        .await
    }};
}
