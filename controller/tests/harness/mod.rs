#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_server::Server;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use common::constants::{NODE_A_NAME, NODE_B_NAME};
use common::schemas::{HealthResponse, NodeStatus};
use common::time_utils::utc_now_ms;
use common::url_utils::base_url_for;
use controller::command::serve::build_state;
use controller::core::state::{ControllerState, MonitorSettings};
use node::agent::NodeAgent;
use node::config::NodeConfig;
use node::server::serve_agent;
use node::state::NodeState;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

pub struct TestServer {
    pub handle: JoinHandle<Result<()>>,
    pub shutdown_tx: watch::Sender<bool>,
    pub addr: SocketAddr,
    pub url: String,
}

impl TestServer {
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        self.handle.abort();
        let _ = self.handle.await;
        Ok(())
    }
}

pub struct TestNode {
    pub server: TestServer,
    pub state: NodeState,
}

impl TestNode {
    pub async fn spawn(config: NodeConfig) -> Result<Self> {
        let state = NodeState::new(NodeAgent::new(config), true);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let url = base_url_for(&addr);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(serve_agent(listener, state.clone(), shutdown_rx));

        Ok(TestNode {
            server: TestServer {
                handle,
                shutdown_tx,
                addr,
                url,
            },
            state,
        })
    }

    pub fn url(&self) -> &str {
        &self.server.url
    }

    pub fn status(&self) -> NodeStatus {
        self.state.agent.snapshot().unwrap().status
    }
}

/// A node that answers health with 200 but reports itself failed, and
/// refuses takeover with a 500.
#[derive(Clone, Default)]
pub struct StubCounters {
    pub health_calls: Arc<AtomicUsize>,
    pub takeover_calls: Arc<AtomicUsize>,
}

impl StubCounters {
    pub fn takeovers(&self) -> usize {
        self.takeover_calls.load(Ordering::SeqCst)
    }
}

async fn stub_health(State(c): State<StubCounters>) -> Json<HealthResponse> {
    c.health_calls.fetch_add(1, Ordering::SeqCst);
    Json(HealthResponse {
        status: NodeStatus::Failed,
        last_heartbeat_ms: Some(utc_now_ms()),
        role: "primary".to_string(),
    })
}

async fn stub_takeover(State(c): State<StubCounters>) -> StatusCode {
    c.takeover_calls.fetch_add(1, Ordering::SeqCst);
    StatusCode::INTERNAL_SERVER_ERROR
}

pub async fn spawn_stub_node() -> Result<(TestServer, StubCounters)> {
    let counters = StubCounters::default();
    let app = Router::new()
        .route("/health", get(stub_health))
        .route("/takeover", post(stub_takeover))
        .with_state(counters.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let url = base_url_for(&addr);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        let server = Server::from_tcp(listener.into_std()?).serve(app.into_make_service());

        tokio::select! {
            res = server => res.map_err(anyhow::Error::from),
            _ = shutdown_rx.changed() => Ok(()),
        }
    });

    Ok((
        TestServer {
            handle,
            shutdown_tx,
            addr,
            url,
        },
        counters,
    ))
}

/// A base URL nothing listens on.
pub async fn dead_url() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(base_url_for(&addr))
}

pub fn fast_settings() -> MonitorSettings {
    MonitorSettings {
        heartbeat_interval: Duration::from_millis(50),
        failover_timeout: Duration::from_secs(2),
        error_backoff: Duration::from_millis(20),
        handoff_retry_budget: Duration::ZERO,
        auto_giveback: true,
    }
}

pub fn controller_for(url_a: &str, url_b: &str, settings: MonitorSettings) -> Result<ControllerState> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;
    build_state(http, (NODE_A_NAME, url_a), (NODE_B_NAME, url_b), settings)
}

/// Two real agents on ephemeral ports plus a controller pointed at them.
pub struct TestPair {
    pub a: TestNode,
    pub b: TestNode,
    pub controller: ControllerState,
}

impl TestPair {
    pub async fn new() -> Result<Self> {
        Self::with_settings(fast_settings()).await
    }

    pub async fn with_settings(settings: MonitorSettings) -> Result<Self> {
        let (config_a, config_b) = NodeConfig::pair(NODE_A_NAME, NODE_B_NAME);
        let a = TestNode::spawn(config_a).await?;
        let b = TestNode::spawn(config_b).await?;
        let controller = controller_for(a.url(), b.url(), settings)?;

        Ok(TestPair { a, b, controller })
    }

    pub async fn shutdown(self) -> Result<()> {
        self.a.server.shutdown().await?;
        self.b.server.shutdown().await?;
        Ok(())
    }
}

/// Lowest-level admin call against an agent.
pub async fn admin(url: &str, path: &str) -> Result<StatusCode> {
    let res = reqwest::Client::new()
        .post(format!("{url}{path}"))
        .send()
        .await?;
    Ok(res.status())
}

pub async fn wait_until<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
