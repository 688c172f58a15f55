use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Healthy,
    Failed,
    Takeover,
    Giveback,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeStatus::Healthy => "healthy",
            NodeStatus::Failed => "failed",
            NodeStatus::Takeover => "takeover",
            NodeStatus::Giveback => "giveback",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LifStatus {
    Online,
    Offline,
    Migrating,
}

impl fmt::Display for LifStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifStatus::Online => "online",
            LifStatus::Offline => "offline",
            LifStatus::Migrating => "migrating",
        };
        f.write_str(s)
    }
}

/// A virtual network endpoint. `home_node` is fixed by configuration,
/// `current_node` tracks which node is serving it right now.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogicalInterface {
    pub name: String,
    pub ip_address: String,
    pub home_node: String,
    pub current_node: String,
    pub status: LifStatus,
    pub protocol: String,
    pub port: u16,
}

impl LogicalInterface {
    /// An online LIF served by its home node.
    pub fn new(name: &str, ip_address: &str, home_node: &str, protocol: &str, port: u16) -> Self {
        Self {
            name: name.to_string(),
            ip_address: ip_address.to_string(),
            home_node: home_node.to_string(),
            current_node: home_node.to_string(),
            status: LifStatus::Online,
            protocol: protocol.to_string(),
            port,
        }
    }

    pub fn is_serving_on(&self, node: &str) -> bool {
        self.status == LifStatus::Online && self.current_node == node
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Volume {
    pub name: String,
    pub size_gb: u64,
    pub used_gb: f64,
    pub state: String,
    pub owner_node: String,
    #[serde(default)]
    pub is_replica: bool,
    #[serde(default)]
    pub last_sync_ms: Option<i128>,
}

/// One journaled write. `sequence_no` is monotonic per originating node by
/// convention only; receivers do not validate it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NvramEntry {
    pub timestamp_ms: i128,
    pub operation: String,
    #[serde(default)]
    pub data: BTreeMap<String, serde_json::Value>,
    pub sequence_no: u64,
}

/// Full state of one node, owned by its agent.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub name: String,
    pub status: NodeStatus,
    pub role: String,
    pub partner_node: String,
    pub last_heartbeat_ms: Option<i128>,
    pub volumes: Vec<Volume>,
    pub lifs: Vec<LogicalInterface>,
    pub nvram_log: Vec<NvramEntry>,
}

impl Node {
    pub fn lif(&self, name: &str) -> Option<&LogicalInterface> {
        self.lifs.iter().find(|l| l.name == name)
    }
}

/// Node identity and lifecycle, without the collections.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeSummary {
    pub name: String,
    pub status: NodeStatus,
    pub role: String,
    pub partner_node: String,
    pub last_heartbeat_ms: Option<i128>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: NodeStatus,
    pub last_heartbeat_ms: Option<i128>,
    pub role: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    pub node: NodeSummary,
    pub volumes: Vec<Volume>,
    pub lifs: Vec<LogicalInterface>,
    pub nvram_entries: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionResponse {
    pub message: String,
    pub timestamp_ms: i128,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResumeLifsResponse {
    pub message: String,
    pub timestamp_ms: i128,
    pub lifs_online: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NvramSyncResponse {
    pub message: String,
    pub sequence_no: u64,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailoverTrigger {
    NodeFailure,
    SimulatedFailure,
}

impl fmt::Display for FailoverTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailoverTrigger::NodeFailure => f.write_str("node_failure"),
            FailoverTrigger::SimulatedFailure => f.write_str("simulated_failure"),
        }
    }
}

/// Immutable record of one completed takeover.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FailoverEvent {
    pub timestamp_ms: i128,
    pub trigger: FailoverTrigger,
    pub failed_node: String,
    pub takeover_node: String,
    pub duration_ms: f64,
}

/// Controller-side liveness bookkeeping for one node.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LivenessRecord {
    pub healthy: bool,
    pub last_seen_ms: Option<i128>,
    pub simulated_failure: bool,
}

impl Default for LivenessRecord {
    fn default() -> Self {
        Self {
            healthy: true,
            last_seen_ms: None,
            simulated_failure: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ControllerStatus {
    pub node_states: BTreeMap<String, LivenessRecord>,
    pub failover_events: Vec<FailoverEvent>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub detail: String,
}
