use axum::{Json, Router, extract::State, http::StatusCode, routing::get};

use common::error::ApiError;
use common::schemas::{ControllerStatus, FailoverEvent};

use crate::core::state::ControllerState;

pub fn router(state: ControllerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(controller_status))
        .route("/events", get(failover_events))
        .with_state(state)
}

// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// GET /status
/// Liveness table plus every recorded failover event.
pub async fn controller_status(
    State(ctx): State<ControllerState>,
) -> Result<Json<ControllerStatus>, ApiError> {
    Ok(Json(ctx.snapshot()?))
}

// GET /events
pub async fn failover_events(
    State(ctx): State<ControllerState>,
) -> Result<Json<Vec<FailoverEvent>>, ApiError> {
    Ok(Json(ctx.events()?))
}
