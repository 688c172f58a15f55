use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tokio::time::sleep;

use common::error::ApiError;

use crate::state::NodeState;

/// Fault injection for tests. Disabled agents reject every `/admin` call.
#[derive(Debug, Default)]
pub struct FaultInjector {
    enabled: bool,
    inject_latency_ms: AtomicU64,
    is_killed: AtomicBool,
}

impl FaultInjector {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn latency_ms(&self) -> u64 {
        self.inject_latency_ms.load(Ordering::Relaxed)
    }

    pub fn is_killed(&self) -> bool {
        self.is_killed.load(Ordering::Relaxed)
    }

    pub async fn apply_latency(&self) {
        let latency_ms = self.latency_ms();
        if latency_ms > 0 {
            sleep(Duration::from_millis(latency_ms)).await;
        }
    }

    pub fn check_killed(&self) -> Result<(), ApiError> {
        if self.is_killed() {
            return Err(ApiError::Any(anyhow::anyhow!("node agent is killed")));
        }
        Ok(())
    }

    pub fn reset(&self) {
        self.inject_latency_ms.store(0, Ordering::Relaxed);
        self.is_killed.store(false, Ordering::Relaxed);
    }

    fn ensure_enabled(&self) -> Result<(), ApiError> {
        if !self.enabled {
            return Err(ApiError::Any(anyhow::anyhow!(
                "fault injection is disabled on this agent"
            )));
        }
        Ok(())
    }
}

/// Runs ahead of every agent route: killed agents answer 500, otherwise the
/// injected latency is applied before the handler.
pub async fn fault_middleware(
    State(ctx): State<NodeState>,
    request: Request,
    next: Next,
) -> Response {
    let faults = &ctx.fault_injector;
    if faults.is_enabled() {
        if let Err(e) = faults.check_killed() {
            return e.into_response();
        }
        faults.apply_latency().await;
    }
    next.run(request).await
}

#[derive(Deserialize)]
pub struct LatencyQuery {
    #[serde(default)]
    pub latency_ms: Option<u64>,
}

/// POST /admin/inject/latency?latency_ms=1000
pub async fn inject_latency(
    Query(params): Query<LatencyQuery>,
    State(ctx): State<NodeState>,
) -> Result<StatusCode, ApiError> {
    ctx.fault_injector.ensure_enabled()?;
    if let Some(latency_ms) = params.latency_ms {
        ctx.fault_injector
            .inject_latency_ms
            .store(latency_ms, Ordering::Relaxed);
    }
    Ok(StatusCode::OK)
}

/// POST /admin/kill -> every agent route answers 500 until reset
pub async fn kill_agent(State(ctx): State<NodeState>) -> Result<StatusCode, ApiError> {
    ctx.fault_injector.ensure_enabled()?;
    ctx.fault_injector.is_killed.store(true, Ordering::Relaxed);
    Ok(StatusCode::OK)
}

/// POST /admin/reset
pub async fn reset_faults(State(ctx): State<NodeState>) -> Result<StatusCode, ApiError> {
    ctx.fault_injector.ensure_enabled()?;
    ctx.fault_injector.reset();
    Ok(StatusCode::OK)
}
