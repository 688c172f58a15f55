//! Heartbeat monitor: polls both agents, keeps the liveness table, and
//! drives takeover on the healthy-to-unhealthy edge of each node.

use futures_util::FutureExt;
use futures_util::future::join_all;
use std::panic::AssertUnwindSafe;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, sleep};
use tracing::{debug, error, info, warn};

use common::client::NodeClient;
use common::error::ApiError;
use common::schemas::{FailoverTrigger, HealthResponse, LivenessRecord, NodeStatus};
use common::time_utils::utc_now_ms;

use crate::core::handoff::{giveback_handoff, takeover_handoff};
use crate::core::state::ControllerState;

/// Outcome of one health probe.
#[derive(Debug)]
pub enum Probe {
    Healthy(HealthResponse),
    /// The agent answered, but reported itself failed.
    SelfReportedFailure(HealthResponse),
    /// The agent refused with its failed-state condition.
    NodeFailed,
    Unreachable(String),
}

impl Probe {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Probe::Healthy(_))
    }
}

pub async fn probe(node: &NodeClient) -> Probe {
    match node.health().await {
        Ok(health) if health.status == NodeStatus::Failed => Probe::SelfReportedFailure(health),
        Ok(health) => Probe::Healthy(health),
        Err(ApiError::NodeFailed) => Probe::NodeFailed,
        Err(e) => Probe::Unreachable(e.to_string()),
    }
}

/// One monitoring tick.
///
/// Both probes run concurrently. Each node's decision is made against its
/// own record as it stood before this tick.
pub async fn poll_once(state: &ControllerState) -> anyhow::Result<()> {
    let members = state.pair.members();

    let previous = members
        .iter()
        .map(|m| state.liveness_of(m.name()))
        .collect::<Result<Vec<_>, _>>()?;

    let probes = join_all(members.iter().map(|m| probe(m))).await;

    for ((node, probe), prev) in members.iter().zip(probes).zip(previous) {
        apply_probe(state, node.name(), probe, prev).await?;
    }

    Ok(())
}

async fn apply_probe(
    state: &ControllerState,
    name: &str,
    probe: Probe,
    prev: LivenessRecord,
) -> anyhow::Result<()> {
    match probe {
        Probe::Healthy(health) => {
            state.update_liveness(name, |r| {
                r.healthy = true;
                r.last_seen_ms = Some(utc_now_ms());
                r.simulated_failure = false;
            })?;
            debug!(node = %name, status = %health.status, "node healthy");

            if !prev.healthy {
                info!(node = %name, "node recovered");
                if state.settings.auto_giveback {
                    if let Err(e) = giveback_handoff(state, name).await {
                        warn!(node = %name, "giveback hand-off failed: {e}");
                    }
                }
            }
        }
        Probe::SelfReportedFailure(_) => {
            if !prev.simulated_failure {
                warn!(node = %name, "node reports simulated failure, initiating takeover");
                state.update_liveness(name, |r| r.simulated_failure = true)?;
                takeover_handoff(state, name, FailoverTrigger::SimulatedFailure).await;
            }
            state.update_liveness(name, |r| r.healthy = false)?;
        }
        unhealthy @ (Probe::NodeFailed | Probe::Unreachable(_)) => {
            match &unhealthy {
                Probe::NodeFailed if prev.healthy => {
                    warn!(node = %name, "node reports failed state")
                }
                Probe::NodeFailed => debug!(node = %name, "node still failed"),
                Probe::Unreachable(e) if !prev.simulated_failure => {
                    warn!(node = %name, "failed to connect to {name}: {e}")
                }
                _ => debug!(node = %name, "node still unreachable"),
            }

            if prev.healthy && !prev.simulated_failure {
                warn!(node = %name, "{name} appears to be down, initiating failover");
                takeover_handoff(state, name, FailoverTrigger::NodeFailure).await;
            }
            state.update_liveness(name, |r| r.healthy = false)?;
        }
    }

    Ok(())
}

/// Poll forever at the heartbeat interval until `shutdown` flips to true.
///
/// An iteration that errors or panics is logged and followed by the error
/// backoff; it never ends the loop.
pub async fn heartbeat_loop(state: ControllerState, mut shutdown: watch::Receiver<bool>) {
    let mut tick = tokio::time::interval(state.settings.heartbeat_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        interval_ms = state.settings.heartbeat_interval.as_millis() as u64,
        "heartbeat monitor started"
    );

    loop {
        tokio::select! {
            _ = tick.tick() => {},
            res = shutdown.changed() => { if res.is_err() || *shutdown.borrow() { break; } }
        }

        let failure = match AssertUnwindSafe(poll_once(&state)).catch_unwind().await {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => format!("{e:#}"),
            Err(_) => "monitor iteration panicked".to_string(),
        };

        error!("transient monitor error: {failure}");
        tokio::select! {
            _ = sleep(state.settings.error_backoff) => {},
            res = shutdown.changed() => { if res.is_err() || *shutdown.borrow() { break; } }
        }
    }

    info!("heartbeat monitor stopped");
}

/// Handle to a running heartbeat loop.
pub struct MonitorHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn start(state: ControllerState) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(heartbeat_loop(state, shutdown_rx));
        Self {
            shutdown_tx,
            handle,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}
