// gateway-server/src/orchestrator/lock.rs
use crate::error::GatewayError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Records with a deployment currently running.
#[derive(Debug, Clone, Default)]
pub struct InFlightDeployments {
    running: Arc<DashMap<String, ()>>,
}

impl InFlightDeployments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `record_id` until the returned guard is dropped.
    pub fn try_acquire(&self, record_id: &str) -> Result<DeploymentGuard, GatewayError> {
        match self.running.entry(record_id.to_string()) {
            Entry::Occupied(_) => Err(GatewayError::DeployInProgress(record_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(DeploymentGuard {
                    record_id: record_id.to_string(),
                    running: self.running.clone(),
                })
            },
        }
    }

    pub fn is_running(&self, record_id: &str) -> bool {
        self.running.contains_key(record_id)
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }
}

/// Releases the record when dropped, whichever way the request ends.
#[derive(Debug)]
pub struct DeploymentGuard {
    record_id: String,
    running: Arc<DashMap<String, ()>>,
}

impl Drop for DeploymentGuard {
    fn drop(&mut self) {
        self.running.remove(&self.record_id);
    }
}
