mod report;

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use futures_util::future::join_all;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use common::client::NodeClient;
use common::constants::{
    DEFAULT_CONTROLLER_URL, DEFAULT_NODE_A_URL, DEFAULT_NODE_B_URL, NODE_A_NAME, NODE_B_NAME,
};
use common::error::ApiError;
use common::schemas::{ControllerStatus, FailoverEvent, HealthResponse, NodeStatus, NvramEntry};
use common::time_utils::utc_now_ms;
use common::trace_middleware::inject_trace_context_reqwest;
use common::url_utils::sanitize_url;

use crate::report::{EventsReport, NodeReport, StatusReport};

#[derive(Parser, Debug)]
#[command(name = "hactl", version, about = "Operator client for the HA storage pair")]
struct Args {
    #[arg(long, global = true, default_value = DEFAULT_NODE_A_URL)]
    node_a_url: String,

    #[arg(long, global = true, default_value = DEFAULT_NODE_B_URL)]
    node_b_url: String,

    #[arg(long, global = true, default_value = DEFAULT_CONTROLLER_URL)]
    controller_url: String,

    /// Per-request timeout
    #[arg(long, global = true, default_value = "5s", value_parser = humantime::parse_duration)]
    timeout: Duration,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Target {
    A,
    B,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Show both nodes and the controller's view
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Simulate a failure on a node
    Fail { node: Target },
    /// Reclaim a failed node's LIFs
    Giveback { node: Target },
    /// Mark the partner LIFs held in takeover as migrating
    PrepareGiveback { node: Target },
    /// Make a node absorb its partner's LIFs once the partner is down
    Takeover {
        node: Target,
        /// Take over even while the partner still answers healthy
        #[arg(long)]
        force: bool,
    },
    /// Bring a node's migrating home LIFs back online
    Resume { node: Target },
    /// Release the partner LIFs held in takeover
    CompleteGiveback { node: Target },
    /// Append an entry to a node's NVRAM log
    NvramSync(NvramSyncArgs),
    /// List failover events recorded by the controller
    Events,
    /// Redraw status until ctrl+c
    Monitor {
        #[arg(long, default_value = "2s", value_parser = humantime::parse_duration)]
        interval: Duration,
    },
    /// Print the first healthy node, as a client would pick it
    ActiveNode,
}

#[derive(ClapArgs, Debug)]
struct NvramSyncArgs {
    node: Target,

    #[arg(long)]
    operation: String,

    #[arg(long)]
    seq: u64,

    /// Payload fields as key=value; values are parsed as JSON when possible
    #[arg(long = "data", value_parser = parse_key_value)]
    data: Vec<(String, Value)>,
}

/// Same rule the controller applies: only an answer with a non-failed
/// status counts as up.
fn partner_is_down(health: &Result<HealthResponse, ApiError>) -> bool {
    !matches!(health, Ok(h) if h.status != NodeStatus::Failed)
}

fn parse_key_value(s: &str) -> Result<(String, Value), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {s:?}"))?;
    if k.is_empty() {
        return Err(format!("empty key in {s:?}"));
    }
    let value = serde_json::from_str(v).unwrap_or_else(|_| Value::String(v.to_string()));
    Ok((k.to_string(), value))
}

struct Cluster {
    http: Client,
    nodes: [NodeClient; 2],
    controller_url: String,
}

impl Cluster {
    fn new(args: &Args) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(args.timeout).build()?;
        Ok(Self {
            nodes: [
                NodeClient::new(http.clone(), NODE_A_NAME, &args.node_a_url)?,
                NodeClient::new(http.clone(), NODE_B_NAME, &args.node_b_url)?,
            ],
            controller_url: sanitize_url(&args.controller_url)?,
            http,
        })
    }

    fn node(&self, target: Target) -> &NodeClient {
        match target {
            Target::A => &self.nodes[0],
            Target::B => &self.nodes[1],
        }
    }

    fn partner(&self, target: Target) -> &NodeClient {
        match target {
            Target::A => &self.nodes[1],
            Target::B => &self.nodes[0],
        }
    }

    async fn controller_get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let url = format!("{}{}", self.controller_url, path);
        let res = inject_trace_context_reqwest(self.http.get(&url))
            .send()
            .await
            .with_context(|| format!("controller unreachable at {}", self.controller_url))?
            .error_for_status()?;
        Ok(res.json::<T>().await?)
    }

    async fn status_report(&self) -> StatusReport {
        let statuses = join_all(self.nodes.iter().map(|n| n.status())).await;
        let nodes = self
            .nodes
            .iter()
            .zip(statuses)
            .map(|(n, res)| {
                let (status, error) = match res {
                    Ok(st) => (Some(st), None),
                    Err(e) => (None, Some(e.to_string())),
                };
                NodeReport {
                    name: n.name().to_string(),
                    url: n.base_url().to_string(),
                    status,
                    error,
                }
            })
            .collect();

        let controller = match self.controller_get::<ControllerStatus>("/status").await {
            Ok(c) => Some(c),
            Err(e) => {
                debug!("controller status unavailable: {e:#}");
                None
            }
        };

        StatusReport { nodes, controller }
    }

    async fn active_node(&self) -> Option<&NodeClient> {
        for node in &self.nodes {
            match node.health().await {
                Ok(h) if h.status != NodeStatus::Failed => return Some(node),
                Ok(_) => debug!(node = %node.name(), "node reports failed"),
                Err(e) => debug!(node = %node.name(), "health check failed: {e}"),
            }
        }
        None
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let args = Args::parse();
    let cluster = Cluster::new(&args)?;

    match args.cmd {
        Cmd::Status { json } => {
            let report = cluster.status_report().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{report}");
            }
        }
        Cmd::Fail { node } => {
            let n = cluster.node(node);
            println!("{}: {}", n.name(), n.failover().await?.message);
        }
        Cmd::Giveback { node } => {
            let n = cluster.node(node);
            println!("{}: {}", n.name(), n.giveback().await?.message);
        }
        Cmd::PrepareGiveback { node } => {
            let n = cluster.node(node);
            println!("{}: {}", n.name(), n.prepare_giveback().await?.message);
        }
        Cmd::Takeover { node, force } => {
            let n = cluster.node(node);
            let partner = cluster.partner(node);
            if !force && !partner_is_down(&partner.health().await) {
                bail!(
                    "{} is still serving its LIFs; refusing takeover by {} (--force overrides)",
                    partner.name(),
                    n.name()
                );
            }
            println!("{}: {}", n.name(), n.takeover().await?.message);
        }
        Cmd::Resume { node } => {
            let n = cluster.node(node);
            let resp = n.resume_lifs().await?;
            println!("{}: {} ({} online)", n.name(), resp.message, resp.lifs_online);
        }
        Cmd::CompleteGiveback { node } => {
            let n = cluster.node(node);
            println!("{}: {}", n.name(), n.complete_giveback().await?.message);
        }
        Cmd::NvramSync(sync) => {
            let n = cluster.node(sync.node);
            let entry = NvramEntry {
                timestamp_ms: utc_now_ms(),
                operation: sync.operation,
                data: sync.data.into_iter().collect::<BTreeMap<_, _>>(),
                sequence_no: sync.seq,
            };
            let resp = n.sync_nvram(&entry).await?;
            println!("{}: {} (seq {})", n.name(), resp.message, resp.sequence_no);
        }
        Cmd::Events => {
            let events = cluster.controller_get::<Vec<FailoverEvent>>("/events").await?;
            print!("{}", EventsReport(&events));
        }
        Cmd::Monitor { interval } => loop {
            let report = cluster.status_report().await;
            // Clear screen, cursor home.
            print!("\x1B[2J\x1B[H{report}");
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = tokio::signal::ctrl_c() => break,
            }
        },
        Cmd::ActiveNode => match cluster.active_node().await {
            Some(n) => println!("{} {}", n.name(), n.base_url()),
            None => bail!("no healthy node available"),
        },
    }

    Ok(())
}
