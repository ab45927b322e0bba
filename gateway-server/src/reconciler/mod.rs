// gateway-server/src/reconciler/mod.rs
//! Writes deployment results back onto the external pick record.
//!
//! A datastore failure never fails the deployment that preceded it; the
//! caller gets the market either way and can retry the write through
//! `/api/reconcile-market`.
pub mod store;
pub mod window;

use crate::error::GatewayError;
use chrono::{DateTime, Utc};
use common::models::deployment::{DatastoreOverride, DbUpdate, ReconcileOutcome};
use common::DatastoreConfig;
use std::sync::Arc;

pub use store::{DatastoreCredentials, MarketStore, MarketUpdate, RestMarketStore, StoreError};
pub use window::{PickTiming, TimeWindow};

#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn MarketStore>,
    config: DatastoreConfig,
}

impl Reconciler {
    pub fn new(store: Arc<dyn MarketStore>, config: DatastoreConfig) -> Self {
        Self { store, config }
    }

    /// Credentials for one call. A request override must carry both url and
    /// key and then replaces configuration entirely; the configured key is
    /// never sent to a request-supplied url. `Ok(None)` when nothing is
    /// configured.
    pub fn credentials(
        &self,
        request: Option<&DatastoreOverride>,
    ) -> Result<Option<DatastoreCredentials>, GatewayError> {
        fn present(value: Option<&String>) -> Option<String> {
            value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        }

        if let Some(request) = request {
            match (present(request.url.as_ref()), present(request.key.as_ref())) {
                (Some(url), Some(key)) => return Ok(Some(DatastoreCredentials { url, key })),
                (None, None) => {},
                _ => {
                    return Err(GatewayError::BadRequest(
                        "datastore override needs both url and key".to_string(),
                    ))
                },
            }
        }

        Ok(present(self.config.url.as_ref())
            .zip(present(self.config.key.as_ref()))
            .map(|(url, key)| DatastoreCredentials { url, key }))
    }

    /// Trading window for a pick. Falls back to the default window whenever
    /// the record cannot be read or has no usable timing.
    pub async fn derive_window(
        &self,
        record_id: Option<&str>,
        creds: Option<&DatastoreCredentials>,
        now: DateTime<Utc>,
    ) -> TimeWindow {
        let default = TimeWindow::default_from(now);
        let (Some(record_id), Some(creds)) = (record_id, creds) else {
            return default;
        };

        match self.store.fetch_timing(creds, record_id).await {
            Ok(Some(timing)) => TimeWindow::from_record(&timing, now).unwrap_or_else(|| {
                tracing::warn!(record_id, "Pick has no usable timing, using default window");
                default
            }),
            Ok(None) => {
                tracing::warn!(record_id, "Pick not found, using default window");
                default
            },
            Err(e) => {
                tracing::warn!(record_id, "Failed to read pick timing: {}", e);
                default
            },
        }
    }

    /// Record a deployed market on its pick. Never fails; the outcome says
    /// whether the write happened.
    pub async fn reconcile(
        &self,
        record_id: &str,
        creds: Option<&DatastoreCredentials>,
        update: &MarketUpdate,
    ) -> ReconcileOutcome {
        let Some(creds) = creds else {
            tracing::info!(record_id, "No datastore configured, skipping reconcile");
            return ReconcileOutcome {
                db_update: DbUpdate::Skipped,
                db_error: None,
            };
        };

        match self.store.record_deployment(creds, record_id, update).await {
            Ok(()) => {
                tracing::info!(record_id, market = %update.market_address, "Pick updated with deployed market");
                ReconcileOutcome {
                    db_update: DbUpdate::Ok,
                    db_error: None,
                }
            },
            Err(e) => {
                tracing::error!(record_id, market = %update.market_address, "Failed to update pick: {}", e);
                ReconcileOutcome {
                    db_update: DbUpdate::Failed,
                    db_error: Some(e.to_string()),
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use common::models::deployment::DeployedMarket;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        timing: Option<PickTiming>,
        fail: bool,
        writes: Mutex<Vec<(DatastoreCredentials, String, MarketUpdate)>>,
    }

    #[async_trait]
    impl MarketStore for MemoryStore {
        async fn fetch_timing(
            &self,
            _creds: &DatastoreCredentials,
            _record_id: &str,
        ) -> Result<Option<PickTiming>, StoreError> {
            if self.fail {
                return Err(StoreError::Status { status: 503, body: "down".into() });
            }
            Ok(self.timing.clone())
        }

        async fn record_deployment(
            &self,
            creds: &DatastoreCredentials,
            record_id: &str,
            update: &MarketUpdate,
        ) -> Result<(), StoreError> {
            if self.fail {
                return Err(StoreError::Status { status: 503, body: "down".into() });
            }
            self.writes
                .lock()
                .unwrap()
                .push((creds.clone(), record_id.to_string(), update.clone()));
            Ok(())
        }
    }

    fn configured() -> DatastoreConfig {
        DatastoreConfig {
            url: Some("https://db.example.co".into()),
            key: Some("service-key".into()),
            ..DatastoreConfig::default()
        }
    }

    fn update() -> MarketUpdate {
        let market = DeployedMarket {
            market_address: "0x00000000000000000000000000000000000000ab".into(),
            yes_share_address: None,
            no_share_address: None,
        };
        MarketUpdate::deployed(&market, 300, 2_000, 1_000)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn creds() -> DatastoreCredentials {
        DatastoreCredentials {
            url: "https://db.example.co".into(),
            key: "service-key".into(),
        }
    }

    #[test]
    fn test_override_replaces_configuration_only_as_a_pair() {
        let reconciler = Reconciler::new(Arc::new(MemoryStore::default()), configured());
        let full = DatastoreOverride {
            url: Some(" https://other.example.co ".into()),
            key: Some("other-key".into()),
        };
        let creds = reconciler.credentials(Some(&full)).unwrap().unwrap();
        assert_eq!(creds.url, "https://other.example.co");
        assert_eq!(creds.key, "other-key");

        // The configured key must never travel to a caller-chosen host
        for partial in [
            DatastoreOverride { url: Some("https://attacker.example".into()), key: None },
            DatastoreOverride { url: Some("https://attacker.example".into()), key: Some("  ".into()) },
            DatastoreOverride { url: None, key: Some("guess".into()) },
        ] {
            assert!(matches!(
                reconciler.credentials(Some(&partial)),
                Err(GatewayError::BadRequest(_))
            ));
        }

        let empty = DatastoreOverride::default();
        assert_eq!(reconciler.credentials(Some(&empty)).unwrap().unwrap().key, "service-key");

        let bare = Reconciler::new(Arc::new(MemoryStore::default()), DatastoreConfig::default());
        assert!(bare.credentials(None).unwrap().is_none());
    }

    #[actix_web::test]
    async fn test_reconcile_outcomes() {
        let store = Arc::new(MemoryStore::default());
        let outcome = Reconciler::new(store.clone(), configured()).reconcile("7", Some(&creds()), &update()).await;
        assert_eq!(outcome.db_update, DbUpdate::Ok);
        let writes = store.writes.lock().unwrap();
        assert_eq!(writes[0].1, "7");
        assert_eq!(writes[0].2.market_status, "deployed");
        drop(writes);

        let skipped = Reconciler::new(store, DatastoreConfig::default()).reconcile("7", None, &update()).await;
        assert_eq!(skipped.db_update, DbUpdate::Skipped);

        let failing = Arc::new(MemoryStore { fail: true, ..Default::default() });
        let failed = Reconciler::new(failing, configured()).reconcile("7", Some(&creds()), &update()).await;
        assert_eq!(failed.db_update, DbUpdate::Failed);
        assert!(failed.db_error.unwrap().contains("503"));
    }

    #[actix_web::test]
    async fn test_derive_window_falls_back_to_default() {
        let failing = Reconciler::new(Arc::new(MemoryStore { fail: true, ..Default::default() }), configured());
        assert_eq!(
            failing.derive_window(Some("7"), Some(&creds()), now()).await,
            TimeWindow::default_from(now())
        );

        let store = MemoryStore {
            timing: Some(PickTiming {
                expires_at: Some("2024-05-01T18:00:00Z".into()),
                duration_hours: None,
            }),
            ..Default::default()
        };
        let window = Reconciler::new(Arc::new(store), configured())
            .derive_window(Some("7"), Some(&creds()), now())
            .await;
        assert_eq!(window.end_time, now().timestamp() + 6 * 3600);

        // A duration far beyond any real market falls back too
        let store = MemoryStore {
            timing: Some(PickTiming {
                expires_at: None,
                duration_hours: Some(1e300),
            }),
            ..Default::default()
        };
        let window = Reconciler::new(Arc::new(store), configured())
            .derive_window(Some("7"), Some(&creds()), now())
            .await;
        assert_eq!(window, TimeWindow::default_from(now()));
    }
}
