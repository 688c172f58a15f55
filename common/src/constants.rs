pub const NODE_A_NAME: &str = "node-a";
pub const NODE_B_NAME: &str = "node-b";

pub const DEFAULT_NODE_A_LISTEN: &str = "127.0.0.1:8001";
pub const DEFAULT_NODE_B_LISTEN: &str = "127.0.0.1:8002";
pub const DEFAULT_CONTROLLER_LISTEN: &str = "127.0.0.1:8000";

pub const DEFAULT_NODE_A_URL: &str = "http://127.0.0.1:8001";
pub const DEFAULT_NODE_B_URL: &str = "http://127.0.0.1:8002";
pub const DEFAULT_CONTROLLER_URL: &str = "http://127.0.0.1:8000";

pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 5;
/// Deadline of the takeover request. Detection reacts on the next poll regardless.
pub const DEFAULT_FAILOVER_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_MONITOR_ERROR_BACKOFF_MS: u64 = 1000;
