use axum::{
    Json, Router,
    extract::State,
    middleware,
    routing::{get, post},
};

use common::error::ApiError;
use common::schemas::{
    ActionResponse, HealthResponse, NvramEntry, NvramSyncResponse, ResumeLifsResponse,
    StatusResponse,
};
use common::trace_middleware::trace_context_middleware;

use crate::fault_injection::{fault_middleware, inject_latency, kill_agent, reset_faults};
use crate::state::NodeState;

pub fn router(state: NodeState) -> Router {
    let agent = Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/failover", post(failover_handler))
        .route("/takeover", post(takeover_handler))
        .route("/giveback", post(giveback_handler))
        .route("/prepare-giveback", post(prepare_giveback_handler))
        .route("/complete-giveback", post(complete_giveback_handler))
        .route("/lifs/online", post(resume_lifs_handler))
        .route("/nvram/sync", post(nvram_sync_handler))
        .route("/nvram", get(nvram_log_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            fault_middleware,
        ));

    let admin = Router::new()
        .route("/admin/inject/latency", post(inject_latency))
        .route("/admin/kill", post(kill_agent))
        .route("/admin/reset", post(reset_faults));

    agent
        .merge(admin)
        .layer(middleware::from_fn(trace_context_middleware))
        .with_state(state)
}

// GET /health
#[tracing::instrument(name = "node.health", skip(ctx), fields(node = %ctx.agent.name()))]
pub async fn health_handler(
    State(ctx): State<NodeState>,
) -> Result<Json<HealthResponse>, ApiError> {
    Ok(Json(ctx.agent.health()?))
}

// GET /status
#[tracing::instrument(name = "node.status", skip(ctx), fields(node = %ctx.agent.name()))]
pub async fn status_handler(
    State(ctx): State<NodeState>,
) -> Result<Json<StatusResponse>, ApiError> {
    Ok(Json(ctx.agent.status()?))
}

// POST /failover
#[tracing::instrument(name = "node.failover", skip(ctx), fields(node = %ctx.agent.name()))]
pub async fn failover_handler(
    State(ctx): State<NodeState>,
) -> Result<Json<ActionResponse>, ApiError> {
    Ok(Json(ctx.agent.failover()?))
}

// POST /takeover
#[tracing::instrument(name = "node.takeover", skip(ctx), fields(node = %ctx.agent.name()))]
pub async fn takeover_handler(
    State(ctx): State<NodeState>,
) -> Result<Json<ActionResponse>, ApiError> {
    Ok(Json(ctx.agent.takeover()?))
}

// POST /giveback
#[tracing::instrument(name = "node.giveback", skip(ctx), fields(node = %ctx.agent.name()))]
pub async fn giveback_handler(
    State(ctx): State<NodeState>,
) -> Result<Json<ActionResponse>, ApiError> {
    Ok(Json(ctx.agent.giveback()?))
}

// POST /prepare-giveback
#[tracing::instrument(name = "node.prepare_giveback", skip(ctx), fields(node = %ctx.agent.name()))]
pub async fn prepare_giveback_handler(
    State(ctx): State<NodeState>,
) -> Result<Json<ActionResponse>, ApiError> {
    Ok(Json(ctx.agent.prepare_giveback()?))
}

// POST /complete-giveback
#[tracing::instrument(name = "node.complete_giveback", skip(ctx), fields(node = %ctx.agent.name()))]
pub async fn complete_giveback_handler(
    State(ctx): State<NodeState>,
) -> Result<Json<ActionResponse>, ApiError> {
    Ok(Json(ctx.agent.complete_giveback()?))
}

// POST /lifs/online
#[tracing::instrument(name = "node.resume_lifs", skip(ctx), fields(node = %ctx.agent.name()))]
pub async fn resume_lifs_handler(
    State(ctx): State<NodeState>,
) -> Result<Json<ResumeLifsResponse>, ApiError> {
    Ok(Json(ctx.agent.resume_lifs()?))
}

// POST /nvram/sync
#[tracing::instrument(name = "node.nvram_sync", skip(ctx, entry), fields(node = %ctx.agent.name(), seq = entry.sequence_no))]
pub async fn nvram_sync_handler(
    State(ctx): State<NodeState>,
    Json(entry): Json<NvramEntry>,
) -> Result<Json<NvramSyncResponse>, ApiError> {
    Ok(Json(ctx.agent.sync_nvram(entry)?))
}

// GET /nvram
pub async fn nvram_log_handler(
    State(ctx): State<NodeState>,
) -> Result<Json<Vec<NvramEntry>>, ApiError> {
    Ok(Json(ctx.agent.nvram_log()?))
}
