use anyhow::anyhow;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use common::constants::{
    DEFAULT_FAILOVER_TIMEOUT_SECS, DEFAULT_HEARTBEAT_INTERVAL_SECS,
    DEFAULT_MONITOR_ERROR_BACKOFF_MS,
};
use common::error::ApiError;
use common::schemas::{ControllerStatus, FailoverEvent, LivenessRecord};

use crate::core::pair::HaPair;

#[derive(Clone, Debug)]
pub struct MonitorSettings {
    pub heartbeat_interval: Duration,
    /// Per-request deadline of the takeover call. Never gates detection.
    pub failover_timeout: Duration,
    /// Pause after an iteration that ended in an unexpected error.
    pub error_backoff: Duration,
    /// Zero keeps the single-attempt hand-off.
    pub handoff_retry_budget: Duration,
    pub auto_giveback: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
            failover_timeout: Duration::from_secs(DEFAULT_FAILOVER_TIMEOUT_SECS),
            error_backoff: Duration::from_millis(DEFAULT_MONITOR_ERROR_BACKOFF_MS),
            handoff_retry_budget: Duration::ZERO,
            auto_giveback: true,
        }
    }
}

/// Controller-owned state. The heartbeat loop is the only writer; the read
/// model routes only ever take snapshots.
#[derive(Clone)]
pub struct ControllerState {
    pub pair: Arc<HaPair>,
    pub liveness: Arc<RwLock<BTreeMap<String, LivenessRecord>>>,
    pub events: Arc<RwLock<Vec<FailoverEvent>>>,
    pub settings: MonitorSettings,
}

impl ControllerState {
    pub fn new(pair: HaPair, settings: MonitorSettings) -> Self {
        let liveness = pair
            .members()
            .iter()
            .map(|m| (m.name().to_string(), LivenessRecord::default()))
            .collect();

        Self {
            pair: Arc::new(pair),
            liveness: Arc::new(RwLock::new(liveness)),
            events: Arc::new(RwLock::new(Vec::new())),
            settings,
        }
    }

    pub fn liveness_of(&self, name: &str) -> Result<LivenessRecord, ApiError> {
        self.liveness
            .read()
            .map_err(|e| ApiError::Any(anyhow!("failed to acquire liveness read lock: {}", e)))?
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::UnknownNode(name.to_string()))
    }

    pub fn update_liveness<F>(&self, name: &str, f: F) -> Result<(), ApiError>
    where
        F: FnOnce(&mut LivenessRecord),
    {
        let mut liveness = self
            .liveness
            .write()
            .map_err(|e| ApiError::Any(anyhow!("failed to acquire liveness write lock: {}", e)))?;
        let record = liveness
            .get_mut(name)
            .ok_or_else(|| ApiError::UnknownNode(name.to_string()))?;
        f(record);
        Ok(())
    }

    pub fn record_event(&self, event: FailoverEvent) -> Result<(), ApiError> {
        self.events
            .write()
            .map_err(|e| ApiError::Any(anyhow!("failed to acquire events write lock: {}", e)))?
            .push(event);
        Ok(())
    }

    pub fn events(&self) -> Result<Vec<FailoverEvent>, ApiError> {
        Ok(self
            .events
            .read()
            .map_err(|e| ApiError::Any(anyhow!("failed to acquire events read lock: {}", e)))?
            .clone())
    }

    pub fn snapshot(&self) -> Result<ControllerStatus, ApiError> {
        let node_states = self
            .liveness
            .read()
            .map_err(|e| ApiError::Any(anyhow!("failed to acquire liveness read lock: {}", e)))?
            .clone();

        Ok(ControllerStatus {
            node_states,
            failover_events: self.events()?,
        })
    }
}
