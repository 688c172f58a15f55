use axum_server::Server;
use clap::{Args, Parser};
use std::time::Duration;
use tracing::info;

use common::client::NodeClient;
use common::constants::{
    DEFAULT_CONTROLLER_LISTEN, DEFAULT_NODE_A_URL, DEFAULT_NODE_B_URL, NODE_A_NAME, NODE_B_NAME,
};
use common::url_utils::parse_socket_addr;

use crate::core::monitor::MonitorHandle;
use crate::core::pair::HaPair;
use crate::core::routes::router;
use crate::core::state::{ControllerState, MonitorSettings};

#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    /// Address the read-model API listens on
    #[arg(long, default_value = DEFAULT_CONTROLLER_LISTEN)]
    listen: String,

    #[arg(long, default_value = DEFAULT_NODE_A_URL)]
    node_a_url: String,

    #[arg(long, default_value = NODE_A_NAME)]
    node_a_name: String,

    #[arg(long, default_value = DEFAULT_NODE_B_URL)]
    node_b_url: String,

    #[arg(long, default_value = NODE_B_NAME)]
    node_b_name: String,

    #[command(flatten)]
    monitor: MonitorArgs,
}

/// Knobs shared by `serve` and `sim`.
#[derive(Args, Debug, Clone)]
pub struct MonitorArgs {
    /// Health poll period
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    pub heartbeat_interval: Duration,

    /// Deadline of a single takeover request
    #[arg(long, default_value = "15s", value_parser = humantime::parse_duration)]
    pub failover_timeout: Duration,

    /// Pause after a monitor iteration fails unexpectedly
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    pub error_backoff: Duration,

    /// Keep retrying a failed takeover for this long (0s = single attempt)
    #[arg(long, default_value = "0s", value_parser = humantime::parse_duration)]
    pub handoff_retry_budget: Duration,

    /// Return LIFs automatically once a failed node is healthy again
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub auto_giveback: bool,

    /// Timeout of health and giveback requests
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    pub http_timeout: Duration,
}

impl MonitorArgs {
    pub fn settings(&self) -> MonitorSettings {
        MonitorSettings {
            heartbeat_interval: self.heartbeat_interval,
            failover_timeout: self.failover_timeout,
            error_backoff: self.error_backoff,
            handoff_retry_budget: self.handoff_retry_budget,
            auto_giveback: self.auto_giveback,
        }
    }

    pub fn http_client(&self) -> anyhow::Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(self.http_timeout)
            .build()?)
    }
}

pub fn build_state(
    http: reqwest::Client,
    node_a: (&str, &str),
    node_b: (&str, &str),
    settings: MonitorSettings,
) -> anyhow::Result<ControllerState> {
    let pair = HaPair::new(
        NodeClient::new(http.clone(), node_a.0, node_a.1)?,
        NodeClient::new(http, node_b.0, node_b.1)?,
    )?;
    Ok(ControllerState::new(pair, settings))
}

pub async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let state = build_state(
        args.monitor.http_client()?,
        (args.node_a_name.as_str(), args.node_a_url.as_str()),
        (args.node_b_name.as_str(), args.node_b_url.as_str()),
        args.monitor.settings(),
    )?;

    let monitor = MonitorHandle::start(state.clone());

    let app = router(state);
    let socket_addr = parse_socket_addr(&args.listen)?;
    let server = Server::bind(socket_addr).serve(app.into_make_service());

    info!("controller listening on {}", args.listen);

    // Graceful shutdown: ctrl+c
    tokio::select! {
        res = server => { res?; }
        _ = tokio::signal::ctrl_c() => {}
    }

    monitor.stop().await;

    Ok(())
}
