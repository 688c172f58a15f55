use std::sync::Arc;

use crate::agent::NodeAgent;
use crate::fault_injection::FaultInjector;

#[derive(Clone)]
pub struct NodeState {
    pub agent: Arc<NodeAgent>,
    pub fault_injector: Arc<FaultInjector>,
}

impl NodeState {
    pub fn new(agent: NodeAgent, fault_injection: bool) -> Self {
        Self {
            agent: Arc::new(agent),
            fault_injector: Arc::new(FaultInjector::new(fault_injection)),
        }
    }
}
