use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde_json::json;
use tower::ServiceExt;

use common::schemas::{
    ActionResponse, ErrorBody, HealthResponse, LifStatus, NodeStatus, NvramEntry,
    NvramSyncResponse, StatusResponse,
};
use node::agent::NodeAgent;
use node::config::{NodeConfig, NodePreset};
use node::routes::router;
use node::state::NodeState;

fn app(preset: NodePreset, fault_injection: bool) -> (Router, NodeState) {
    let state = NodeState::new(NodeAgent::new(NodeConfig::preset(preset)), fault_injection);
    (router(state.clone()), state)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

fn parse<T: DeserializeOwned>(bytes: &[u8]) -> T {
    serde_json::from_slice(bytes).unwrap()
}

#[tokio::test]
async fn health_reports_status_and_role() {
    let (app, _) = app(NodePreset::A, false);

    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);

    let health: HealthResponse = parse(&body);
    assert_eq!(health.status, NodeStatus::Healthy);
    assert_eq!(health.role, "primary");
    assert!(health.last_heartbeat_ms.is_some());
}

#[tokio::test]
async fn failed_node_answers_503_on_health_and_status() {
    let (app, _) = app(NodePreset::A, false);

    let (status, body) = call(&app, "POST", "/failover", None).await;
    assert_eq!(status, StatusCode::OK);
    let resp: ActionResponse = parse(&body);
    assert_eq!(resp.message, "Failover initiated");

    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let err: ErrorBody = parse(&body);
    assert_eq!(err.detail, "node is in failed state");

    let (status, _) = call(&app, "GET", "/status", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn giveback_on_healthy_node_is_400() {
    let (app, state) = app(NodePreset::A, false);
    let before = state.agent.snapshot().unwrap();

    let (status, body) = call(&app, "POST", "/giveback", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let err: ErrorBody = parse(&body);
    assert!(err.detail.contains("failed state for giveback"));

    assert_eq!(state.agent.snapshot().unwrap(), before);
}

#[tokio::test]
async fn prepare_giveback_requires_takeover() {
    let (app, _) = app(NodePreset::B, false);

    let (status, _) = call(&app, "POST", "/prepare-giveback", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, "POST", "/takeover", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, "POST", "/prepare-giveback", None).await;
    assert_eq!(status, StatusCode::OK);
    let resp: ActionResponse = parse(&body);
    assert_eq!(resp.message, "Ready for giveback");
}

#[tokio::test]
async fn giveback_steps_on_failed_node_are_400() {
    let (app, state) = app(NodePreset::A, false);

    let (status, _) = call(&app, "POST", "/failover", None).await;
    assert_eq!(status, StatusCode::OK);
    let before = state.agent.snapshot().unwrap();

    for uri in ["/prepare-giveback", "/complete-giveback"] {
        let (status, body) = call(&app, "POST", uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        let err: ErrorBody = parse(&body);
        assert!(err.detail.contains("takeover state"), "{uri}: {}", err.detail);
    }

    assert_eq!(state.agent.snapshot().unwrap(), before);
}

#[tokio::test]
async fn takeover_twice_acknowledges_and_keeps_lifs() {
    let (app, _) = app(NodePreset::B, false);

    let (_, body) = call(&app, "POST", "/takeover", None).await;
    let first: ActionResponse = parse(&body);
    assert_eq!(first.message, "Takeover initiated");

    let (status, body) = call(&app, "POST", "/takeover", None).await;
    assert_eq!(status, StatusCode::OK);
    let second: ActionResponse = parse(&body);
    assert_eq!(second.message, "Already in takeover mode");

    let (_, body) = call(&app, "GET", "/status", None).await;
    let snapshot: StatusResponse = parse(&body);
    assert_eq!(snapshot.node.status, NodeStatus::Takeover);
    let lif1: Vec<_> = snapshot.lifs.iter().filter(|l| l.name == "lif1").collect();
    assert_eq!(lif1.len(), 1);
    assert_eq!(lif1[0].status, LifStatus::Online);
    assert_eq!(lif1[0].current_node, "node-b");
}

#[tokio::test]
async fn nvram_sync_echoes_sequence_and_counts() {
    let (app, _) = app(NodePreset::B, false);

    for seq in [3u64, 1, 2] {
        let (status, body) = call(
            &app,
            "POST",
            "/nvram/sync",
            Some(json!({
                "timestamp_ms": 1_700_000_000_000i64,
                "operation": "write",
                "data": {"file": "a.txt", "bytes": 42},
                "sequence_no": seq
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let resp: NvramSyncResponse = parse(&body);
        assert_eq!(resp.sequence_no, seq);
    }

    let (_, body) = call(&app, "GET", "/status", None).await;
    let snapshot: StatusResponse = parse(&body);
    assert_eq!(snapshot.nvram_entries, 3);

    let (_, body) = call(&app, "GET", "/nvram", None).await;
    let log: Vec<NvramEntry> = parse(&body);
    let seqs: Vec<_> = log.iter().map(|e| e.sequence_no).collect();
    assert_eq!(seqs, vec![3, 1, 2]);
    assert_eq!(log[0].data["bytes"], json!(42));
}

#[tokio::test]
async fn malformed_nvram_entry_is_rejected() {
    let (app, state) = app(NodePreset::A, false);

    let (status, _) = call(&app, "POST", "/nvram/sync", Some(json!({"operation": "write"}))).await;
    assert!(status.is_client_error());
    assert!(state.agent.nvram_log().unwrap().is_empty());
}

#[tokio::test]
async fn killed_agent_answers_500_until_reset() {
    let (app, _) = app(NodePreset::A, true);

    let (status, _) = call(&app, "POST", "/admin/kill", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = call(&app, "POST", "/admin/reset", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn injected_latency_delays_agent_routes_until_reset() {
    let (app, state) = app(NodePreset::A, true);

    let (status, _) = call(&app, "POST", "/admin/inject/latency?latency_ms=200", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.fault_injector.latency_ms(), 200);

    let start = std::time::Instant::now();
    let (status, _) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(start.elapsed() >= std::time::Duration::from_millis(200));

    let (status, _) = call(&app, "POST", "/admin/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.fault_injector.latency_ms(), 0);
}

#[tokio::test]
async fn fault_injection_disabled_by_default() {
    let (app, _) = app(NodePreset::A, false);

    let (status, _) = call(&app, "POST", "/admin/kill", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let (status, _) = call(&app, "POST", "/admin/inject/latency?latency_ms=5000", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}
