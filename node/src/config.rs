use clap::ValueEnum;

use common::constants::{NODE_A_NAME, NODE_B_NAME};
use common::schemas::{LogicalInterface, Volume};

/// Which half of the HA pair an agent plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum NodePreset {
    A,
    B,
}

/// Static configuration of one node: its identity, the volumes and LIFs it
/// owns, and the home LIFs of its partner that it mirrors on takeover.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub name: String,
    pub role: String,
    pub partner: String,
    pub volumes: Vec<Volume>,
    pub lifs: Vec<LogicalInterface>,
    pub partner_lifs: Vec<LogicalInterface>,
}

impl NodeConfig {
    /// Both halves of a pair named `a` (primary) and `b` (secondary).
    pub fn pair(a: &str, b: &str) -> (NodeConfig, NodeConfig) {
        let lifs_a = vec![LogicalInterface::new("lif1", "192.168.1.10", a, "nfs", 2049)];
        let lifs_b = vec![LogicalInterface::new("lif2", "192.168.1.11", b, "nfs", 2049)];

        let node_a = NodeConfig {
            name: a.to_string(),
            role: "primary".to_string(),
            partner: b.to_string(),
            volumes: vec![Volume {
                name: "vol1".to_string(),
                size_gb: 100,
                used_gb: 20.5,
                state: "online".to_string(),
                owner_node: a.to_string(),
                is_replica: false,
                last_sync_ms: None,
            }],
            lifs: lifs_a.clone(),
            partner_lifs: lifs_b.clone(),
        };

        let node_b = NodeConfig {
            name: b.to_string(),
            role: "secondary".to_string(),
            partner: a.to_string(),
            volumes: vec![Volume {
                name: "vol1-replica".to_string(),
                size_gb: 100,
                used_gb: 20.5,
                state: "online".to_string(),
                owner_node: b.to_string(),
                is_replica: true,
                last_sync_ms: None,
            }],
            lifs: lifs_b,
            partner_lifs: lifs_a,
        };

        (node_a, node_b)
    }

    pub fn preset(preset: NodePreset) -> NodeConfig {
        let (a, b) = NodeConfig::pair(NODE_A_NAME, NODE_B_NAME);
        match preset {
            NodePreset::A => a,
            NodePreset::B => b,
        }
    }
}
