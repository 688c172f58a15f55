//! The node agent: sole owner of one node's status, volumes, LIFs and NVRAM log.
//!
//! All mutating operations take the write half of a single lock for their
//! whole duration, so concurrent requests against one agent are applied in
//! some total order. Readers clone a snapshot under the read half and never
//! observe a partially applied request.

use anyhow::anyhow;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

use common::error::ApiError;
use common::schemas::{
    ActionResponse, HealthResponse, LifStatus, LogicalInterface, Node, NodeStatus, NodeSummary,
    NvramEntry, NvramSyncResponse, ResumeLifsResponse, StatusResponse,
};
use common::time_utils::utc_now_ms;

use crate::config::NodeConfig;
use crate::lifecycle::{NodeEvent, Transition, next_status};

pub struct NodeAgent {
    name: String,
    partner: String,
    partner_lifs: Vec<LogicalInterface>,
    node: RwLock<Node>,
    // Stamped by health checks without taking the write lock.
    last_heartbeat_ms: AtomicI64,
}

impl NodeAgent {
    pub fn new(config: NodeConfig) -> Self {
        let node = Node {
            name: config.name.clone(),
            status: NodeStatus::Healthy,
            role: config.role,
            partner_node: config.partner.clone(),
            last_heartbeat_ms: None,
            volumes: config.volumes,
            lifs: config.lifs,
            nvram_log: Vec::new(),
        };

        Self {
            name: config.name,
            partner: config.partner,
            partner_lifs: config.partner_lifs,
            node: RwLock::new(node),
            last_heartbeat_ms: AtomicI64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partner(&self) -> &str {
        &self.partner
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Node>, ApiError> {
        self.node
            .read()
            .map_err(|e| ApiError::Any(anyhow!("failed to acquire node read lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Node>, ApiError> {
        self.node
            .write()
            .map_err(|e| ApiError::Any(anyhow!("failed to acquire node write lock: {}", e)))
    }

    fn heartbeat(&self) -> Option<i128> {
        match self.last_heartbeat_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(ms as i128),
        }
    }

    /// Refuses with `NodeFailed` while the node is failed, so callers can
    /// tell a self-reported failure from an unreachable node.
    pub fn health(&self) -> Result<HealthResponse, ApiError> {
        let node = self.read()?;
        if node.status == NodeStatus::Failed {
            return Err(ApiError::NodeFailed);
        }

        let now = utc_now_ms();
        self.last_heartbeat_ms.store(now as i64, Ordering::Relaxed);

        Ok(HealthResponse {
            status: node.status,
            last_heartbeat_ms: Some(now),
            role: node.role.clone(),
        })
    }

    pub fn status(&self) -> Result<StatusResponse, ApiError> {
        let node = self.read()?;
        if node.status == NodeStatus::Failed {
            return Err(ApiError::NodeFailed);
        }

        Ok(StatusResponse {
            node: NodeSummary {
                name: node.name.clone(),
                status: node.status,
                role: node.role.clone(),
                partner_node: node.partner_node.clone(),
                last_heartbeat_ms: self.heartbeat(),
            },
            volumes: node.volumes.clone(),
            lifs: node.lifs.clone(),
            nvram_entries: node.nvram_log.len(),
        })
    }

    /// Full copy of the node, regardless of status.
    pub fn snapshot(&self) -> Result<Node, ApiError> {
        let mut node = self.read()?.clone();
        node.last_heartbeat_ms = self.heartbeat();
        Ok(node)
    }

    pub fn failover(&self) -> Result<ActionResponse, ApiError> {
        let mut node = self.write()?;
        let Transition::To(status) = next_status(node.status, NodeEvent::Failover)? else {
            return Err(ApiError::invalid_state("unexpected failover transition"));
        };

        node.status = status;
        for lif in node.lifs.iter_mut().filter(|l| l.current_node == self.name) {
            lif.status = LifStatus::Migrating;
            lif.current_node = self.partner.clone();
        }

        warn!(node = %self.name, partner = %self.partner, "failover initiated, LIFs migrating to partner");
        Ok(action("Failover initiated"))
    }

    /// Absorb the partner's home LIFs. Repeating the call is a no-op.
    pub fn takeover(&self) -> Result<ActionResponse, ApiError> {
        let mut node = self.write()?;
        let status = match next_status(node.status, NodeEvent::Takeover)? {
            Transition::AlreadyInTakeover => {
                info!(node = %self.name, "takeover requested while already in takeover");
                return Ok(action("Already in takeover mode"));
            }
            Transition::To(status) => status,
            Transition::Unchanged => {
                return Err(ApiError::invalid_state("unexpected takeover transition"));
            }
        };

        node.status = status;
        for template in &self.partner_lifs {
            let mirrored = LogicalInterface {
                home_node: self.partner.clone(),
                current_node: self.name.clone(),
                status: LifStatus::Online,
                ..template.clone()
            };
            match node.lifs.iter_mut().find(|l| l.name == mirrored.name) {
                Some(existing) => *existing = mirrored,
                None => node.lifs.push(mirrored),
            }
        }

        info!(node = %self.name, partner = %self.partner, lifs = self.partner_lifs.len(), "takeover initiated");
        Ok(action("Takeover initiated"))
    }

    /// Reclaim home LIFs after a failure. They stay `Migrating` until the
    /// partner has released its copies and [`NodeAgent::resume_lifs`] runs.
    pub fn giveback(&self) -> Result<ActionResponse, ApiError> {
        let mut node = self.write()?;
        let Transition::To(status) = next_status(node.status, NodeEvent::Giveback)? else {
            return Err(ApiError::invalid_state("unexpected giveback transition"));
        };

        node.status = NodeStatus::Giveback;
        for lif in node.lifs.iter_mut().filter(|l| l.home_node == self.name) {
            lif.status = LifStatus::Migrating;
            lif.current_node = self.name.clone();
        }
        node.status = status;

        info!(node = %self.name, "giveback completed");
        Ok(action("Giveback completed"))
    }

    pub fn prepare_giveback(&self) -> Result<ActionResponse, ApiError> {
        let mut node = self.write()?;
        next_status(node.status, NodeEvent::PrepareGiveback)?;

        for lif in node.lifs.iter_mut().filter(|l| l.home_node == self.partner) {
            lif.status = LifStatus::Migrating;
        }

        info!(node = %self.name, partner = %self.partner, "ready for giveback");
        Ok(action("Ready for giveback"))
    }

    /// Drop the mirrored partner LIFs and leave takeover mode.
    pub fn complete_giveback(&self) -> Result<ActionResponse, ApiError> {
        let mut node = self.write()?;
        let Transition::To(status) = next_status(node.status, NodeEvent::CompleteGiveback)? else {
            return Err(ApiError::invalid_state("unexpected giveback transition"));
        };

        let partner = &self.partner;
        node.lifs.retain(|l| &l.home_node != partner);
        node.status = status;

        info!(node = %self.name, partner = %self.partner, "partner LIFs released");
        Ok(action("Giveback released"))
    }

    pub fn resume_lifs(&self) -> Result<ResumeLifsResponse, ApiError> {
        let mut node = self.write()?;
        next_status(node.status, NodeEvent::ResumeLifs)?;

        let mut lifs_online = 0;
        for lif in node
            .lifs
            .iter_mut()
            .filter(|l| l.home_node == self.name && l.status == LifStatus::Migrating)
        {
            lif.status = LifStatus::Online;
            lif.current_node = self.name.clone();
            lifs_online += 1;
        }

        info!(node = %self.name, lifs_online, "home LIFs online");
        Ok(ResumeLifsResponse {
            message: "LIFs online".to_string(),
            timestamp_ms: utc_now_ms(),
            lifs_online,
        })
    }

    /// Append-only; accepted in every status, including failed.
    pub fn sync_nvram(&self, entry: NvramEntry) -> Result<NvramSyncResponse, ApiError> {
        let sequence_no = entry.sequence_no;
        self.write()?.nvram_log.push(entry);

        Ok(NvramSyncResponse {
            message: "NVRAM entry synchronized".to_string(),
            sequence_no,
        })
    }

    pub fn nvram_log(&self) -> Result<Vec<NvramEntry>, ApiError> {
        Ok(self.read()?.nvram_log.clone())
    }
}

fn action(message: &str) -> ActionResponse {
    ActionResponse {
        message: message.to_string(),
        timestamp_ms: utc_now_ms(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn pair() -> (NodeAgent, NodeAgent) {
        let (a, b) = NodeConfig::pair("node-a", "node-b");
        (NodeAgent::new(a), NodeAgent::new(b))
    }

    fn entry(seq: u64) -> NvramEntry {
        NvramEntry {
            timestamp_ms: utc_now_ms(),
            operation: "write".to_string(),
            data: [("file".to_string(), serde_json::json!(format!("f{seq}")))]
                .into_iter()
                .collect(),
            sequence_no: seq,
        }
    }

    fn lif_names(nodes: &[&NodeAgent]) -> BTreeSet<String> {
        nodes
            .iter()
            .flat_map(|n| n.snapshot().unwrap().lifs)
            .map(|l| l.name)
            .collect()
    }

    fn online_count(nodes: &[&NodeAgent], lif: &str) -> usize {
        nodes
            .iter()
            .filter(|n| {
                let node = n.snapshot().unwrap();
                node.lif(lif).is_some_and(|l| l.is_serving_on(&node.name))
            })
            .count()
    }

    #[test]
    fn failover_migrates_served_lifs_to_partner() {
        let (a, _) = pair();
        let before = a.snapshot().unwrap();
        let served: Vec<_> = before
            .lifs
            .iter()
            .filter(|l| l.current_node == "node-a")
            .map(|l| l.name.clone())
            .collect();

        a.failover().unwrap();

        let after = a.snapshot().unwrap();
        assert_eq!(after.status, NodeStatus::Failed);
        for name in served {
            let lif = after.lif(&name).unwrap();
            assert_eq!(lif.status, LifStatus::Migrating);
            assert_eq!(lif.current_node, "node-b");
        }
    }

    #[test]
    fn failed_node_refuses_health_and_status() {
        let (a, _) = pair();
        a.failover().unwrap();
        assert!(matches!(a.health(), Err(ApiError::NodeFailed)));
        assert!(matches!(a.status(), Err(ApiError::NodeFailed)));
        assert!(matches!(a.takeover(), Err(ApiError::NodeFailed)));
    }

    #[test]
    fn takeover_absorbs_partner_home_lifs_online() {
        let (_, b) = pair();
        let resp = b.takeover().unwrap();
        assert_eq!(resp.message, "Takeover initiated");

        let node = b.snapshot().unwrap();
        assert_eq!(node.status, NodeStatus::Takeover);
        let lif1 = node.lif("lif1").unwrap();
        assert_eq!(lif1.status, LifStatus::Online);
        assert_eq!(lif1.current_node, "node-b");
        assert_eq!(lif1.home_node, "node-a");
        assert_eq!(lif1.ip_address, "192.168.1.10");
    }

    #[test]
    fn takeover_is_idempotent() {
        let (_, b) = pair();
        b.takeover().unwrap();
        let first = b.snapshot().unwrap();

        for _ in 0..2 {
            let resp = b.takeover().unwrap();
            assert_eq!(resp.message, "Already in takeover mode");
        }

        let after = b.snapshot().unwrap();
        assert_eq!(after.status, first.status);
        assert_eq!(after.lifs, first.lifs);
        assert_eq!(after.lifs.iter().filter(|l| l.name == "lif1").count(), 1);
    }

    #[test]
    fn giveback_rejected_unless_failed() {
        let (a, b) = pair();
        b.takeover().unwrap();

        for agent in [&a, &b] {
            let before = agent.snapshot().unwrap();
            assert!(matches!(agent.giveback(), Err(ApiError::InvalidState(_))));
            assert_eq!(agent.snapshot().unwrap(), before);
        }
    }

    #[test]
    fn giveback_restores_healthy_with_home_lifs_migrating() {
        let (a, _) = pair();
        a.failover().unwrap();
        a.giveback().unwrap();

        let node = a.snapshot().unwrap();
        assert_eq!(node.status, NodeStatus::Healthy);
        let lif1 = node.lif("lif1").unwrap();
        assert_eq!(lif1.status, LifStatus::Migrating);
        assert_eq!(lif1.current_node, "node-a");
    }

    #[test]
    fn prepare_giveback_marks_partner_lifs_migrating() {
        let (a, b) = pair();
        assert!(matches!(b.prepare_giveback(), Err(ApiError::InvalidState(_))));

        b.takeover().unwrap();
        b.prepare_giveback().unwrap();

        let node = b.snapshot().unwrap();
        assert_eq!(node.status, NodeStatus::Takeover);
        assert_eq!(node.lif("lif1").unwrap().status, LifStatus::Migrating);
        assert_eq!(node.lif("lif2").unwrap().status, LifStatus::Online);

        a.failover().unwrap();
        assert!(matches!(a.prepare_giveback(), Err(ApiError::InvalidState(_))));
        assert!(matches!(a.complete_giveback(), Err(ApiError::InvalidState(_))));
        assert_eq!(a.snapshot().unwrap().status, NodeStatus::Failed);
    }

    #[test]
    fn full_cycle_keeps_lif_names_and_single_owner() {
        let (a, b) = pair();
        let names = lif_names(&[&a, &b]);

        a.failover().unwrap();
        assert_eq!(online_count(&[&a, &b], "lif1"), 0);
        assert_eq!(lif_names(&[&a, &b]), names);

        b.takeover().unwrap();
        assert_eq!(online_count(&[&a, &b], "lif1"), 1);
        assert_eq!(lif_names(&[&a, &b]), names);

        a.giveback().unwrap();
        assert_eq!(online_count(&[&a, &b], "lif1"), 1);
        assert_eq!(lif_names(&[&a, &b]), names);

        b.prepare_giveback().unwrap();
        b.complete_giveback().unwrap();
        assert_eq!(online_count(&[&a, &b], "lif1"), 0);

        let resumed = a.resume_lifs().unwrap();
        assert_eq!(resumed.lifs_online, 1);
        assert_eq!(online_count(&[&a, &b], "lif1"), 1);
        assert_eq!(lif_names(&[&a, &b]), names);

        assert_eq!(a.snapshot().unwrap().status, NodeStatus::Healthy);
        assert_eq!(b.snapshot().unwrap().status, NodeStatus::Healthy);
        assert!(b.snapshot().unwrap().lif("lif1").is_none());
    }

    #[test]
    fn second_takeover_after_release_does_not_duplicate() {
        let (_, b) = pair();
        b.takeover().unwrap();
        b.prepare_giveback().unwrap();
        b.complete_giveback().unwrap();
        b.takeover().unwrap();

        let node = b.snapshot().unwrap();
        assert_eq!(node.lifs.iter().filter(|l| l.name == "lif1").count(), 1);
    }

    #[test]
    fn nvram_sync_is_additive_in_any_status() {
        let (a, _) = pair();
        a.sync_nvram(entry(1)).unwrap();
        let first = a.nvram_log().unwrap()[0].clone();

        a.failover().unwrap();
        let resp = a.sync_nvram(entry(2)).unwrap();
        assert_eq!(resp.sequence_no, 2);

        let log = a.nvram_log().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0], first);
    }

    #[test]
    fn concurrent_nvram_syncs_are_all_kept() {
        let (a, _) = pair();
        let a = Arc::new(a);
        a.sync_nvram(entry(0)).unwrap();

        let handles: Vec<_> = (1..=8)
            .map(|t| {
                let a = a.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        a.sync_nvram(entry(t * 100 + i)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let log = a.nvram_log().unwrap();
        assert_eq!(log.len(), 1 + 8 * 25);
        assert_eq!(log[0].sequence_no, 0);
    }

    #[test]
    fn concurrent_failover_and_giveback_leave_consistent_lifs() {
        for _ in 0..50 {
            let (a, _) = pair();
            let a = Arc::new(a);

            let f = {
                let a = a.clone();
                std::thread::spawn(move || a.failover().is_ok())
            };
            let g = {
                let a = a.clone();
                std::thread::spawn(move || a.giveback().is_ok())
            };
            let failed_over = f.join().unwrap();
            let gave_back = g.join().unwrap();
            assert!(failed_over);

            let node = a.snapshot().unwrap();
            let lif1 = node.lif("lif1").unwrap();
            if gave_back {
                assert_eq!(node.status, NodeStatus::Healthy);
                assert_eq!(lif1.current_node, "node-a");
            } else {
                assert_eq!(node.status, NodeStatus::Failed);
                assert_eq!(lif1.current_node, "node-b");
            }
            assert_eq!(lif1.status, LifStatus::Migrating);
        }
    }

    #[test]
    fn health_stamps_last_heartbeat() {
        let (a, _) = pair();
        assert_eq!(a.snapshot().unwrap().last_heartbeat_ms, None);
        let h = a.health().unwrap();
        assert_eq!(h.status, NodeStatus::Healthy);
        assert_eq!(h.role, "primary");
        assert!(a.snapshot().unwrap().last_heartbeat_ms.is_some());
    }
}
