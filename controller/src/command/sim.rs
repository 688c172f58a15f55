use axum_server::Server;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use common::constants::{
    DEFAULT_CONTROLLER_LISTEN, DEFAULT_NODE_A_LISTEN, DEFAULT_NODE_B_LISTEN, NODE_A_NAME,
    NODE_B_NAME,
};
use common::url_utils::{base_url_for, parse_socket_addr};

use node::agent::NodeAgent;
use node::config::NodeConfig;
use node::server::serve_agent;
use node::state::NodeState;

use crate::command::serve::{MonitorArgs, build_state};
use crate::core::monitor::MonitorHandle;
use crate::core::routes::router;

#[derive(Parser, Debug, Clone)]
pub struct SimArgs {
    #[arg(long, default_value = DEFAULT_NODE_A_LISTEN)]
    node_a_listen: String,

    #[arg(long, default_value = DEFAULT_NODE_B_LISTEN)]
    node_b_listen: String,

    #[arg(long, default_value = DEFAULT_CONTROLLER_LISTEN)]
    listen: String,

    /// Expose the /admin fault injection endpoints on both agents
    #[arg(long, default_value_t = false)]
    enable_fault_injection: bool,

    #[command(flatten)]
    monitor: MonitorArgs,
}

/// Run both agents and the controller in one process until ctrl+c.
pub async fn sim(args: SimArgs) -> anyhow::Result<()> {
    let (config_a, config_b) = NodeConfig::pair(NODE_A_NAME, NODE_B_NAME);

    let listener_a = TcpListener::bind(parse_socket_addr(&args.node_a_listen)?).await?;
    let listener_b = TcpListener::bind(parse_socket_addr(&args.node_b_listen)?).await?;
    let url_a = base_url_for(&listener_a.local_addr()?);
    let url_b = base_url_for(&listener_b.local_addr()?);

    let (shutdown_tx, shutdown_rx) = watch::channel::<bool>(false);
    let agents = [
        tokio::spawn(serve_agent(
            listener_a,
            NodeState::new(NodeAgent::new(config_a), args.enable_fault_injection),
            shutdown_rx.clone(),
        )),
        tokio::spawn(serve_agent(
            listener_b,
            NodeState::new(NodeAgent::new(config_b), args.enable_fault_injection),
            shutdown_rx,
        )),
    ];

    let state = build_state(
        args.monitor.http_client()?,
        (NODE_A_NAME, url_a.as_str()),
        (NODE_B_NAME, url_b.as_str()),
        args.monitor.settings(),
    )?;
    let monitor = MonitorHandle::start(state.clone());

    let socket_addr = parse_socket_addr(&args.listen)?;
    let server = Server::bind(socket_addr).serve(router(state).into_make_service());

    info!("HA pair simulator running");
    info!("  {NODE_A_NAME}: {url_a}");
    info!("  {NODE_B_NAME}: {url_b}");
    info!("  controller: http://{socket_addr}");

    tokio::select! {
        res = server => { res?; }
        _ = tokio::signal::ctrl_c() => { info!("shutting down simulator"); }
    }

    monitor.stop().await;
    let _ = shutdown_tx.send(true);
    for agent in agents {
        match agent.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("node agent exited with error: {e:#}"),
            Err(e) => error!("node agent task failed: {e}"),
        }
    }

    info!("shutdown complete");

    Ok(())
}
