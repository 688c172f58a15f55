use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;

use common::constants::{DEFAULT_NODE_A_LISTEN, DEFAULT_NODE_B_LISTEN};
use common::telemetry::init_telemetry;
use common::url_utils::parse_socket_addr;

use node::agent::NodeAgent;
use node::config::{NodeConfig, NodePreset};
use node::server::serve_agent;
use node::state::NodeState;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "HA pair node agent")]
struct Args {
    /// Which half of the pair to run
    #[arg(long, value_enum, default_value_t = NodePreset::A)]
    node: NodePreset,

    /// Address to listen on (defaults to 127.0.0.1:8001 for a, :8002 for b)
    #[arg(long)]
    listen: Option<String>,

    /// Override this node's name
    #[arg(long)]
    name: Option<String>,

    /// Override the partner's name
    #[arg(long)]
    partner: Option<String>,

    /// Expose the /admin fault injection endpoints
    #[arg(long, default_value_t = false)]
    enable_fault_injection: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry("node");

    let args = Args::parse();

    let preset = NodeConfig::preset(args.node);
    let name = args.name.clone().unwrap_or(preset.name);
    let partner = args.partner.clone().unwrap_or(preset.partner);
    let config = match args.node {
        NodePreset::A => NodeConfig::pair(&name, &partner).0,
        NodePreset::B => NodeConfig::pair(&partner, &name).1,
    };

    let listen = args.listen.clone().unwrap_or_else(|| {
        match args.node {
            NodePreset::A => DEFAULT_NODE_A_LISTEN,
            NodePreset::B => DEFAULT_NODE_B_LISTEN,
        }
        .to_string()
    });

    let state = NodeState::new(NodeAgent::new(config), args.enable_fault_injection);
    let listener = TcpListener::bind(parse_socket_addr(&listen)?).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel::<bool>(false);
    let mut server = tokio::spawn(serve_agent(listener, state, shutdown_rx));

    // Graceful shutdown: ctrl+c
    tokio::select! {
        res = &mut server => { return res?; }
        _ = tokio::signal::ctrl_c() => {}
    }

    let _ = shutdown_tx.send(true);
    server.await??;

    Ok(())
}
