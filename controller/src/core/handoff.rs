//! Hand-offs the controller drives between the two agents.

use std::time::Instant;
use tracing::{debug, error, info, warn};

use common::error::ApiError;
use common::schemas::{FailoverEvent, FailoverTrigger, NodeStatus};
use common::time_utils::{elapsed_ms, utc_now_ms};

use crate::core::retry::{RetryConfig, classify_api_error, retry_timeboxed};
use crate::core::state::ControllerState;

/// Ask the partner of `failed` to take over, and record the event on success.
///
/// A failed hand-off is logged and leaves no event behind. With a zero retry
/// budget it is attempted exactly once per failure episode.
#[tracing::instrument(name = "controller.takeover", skip_all, fields(failed = %failed, trigger = %trigger))]
pub async fn takeover_handoff(
    state: &ControllerState,
    failed: &str,
    trigger: FailoverTrigger,
) -> Option<FailoverEvent> {
    let Some(partner) = state.pair.partner_of(failed) else {
        error!(node = %failed, "no partner configured for node, cannot take over");
        return None;
    };

    let timestamp_ms = utc_now_ms();
    let start = Instant::now();
    let retry = RetryConfig::with_budget(state.settings.handoff_retry_budget);

    let result = retry_timeboxed(
        &retry,
        || partner.takeover_within(state.settings.failover_timeout),
        classify_api_error,
    )
    .await;

    match result {
        Ok(resp) => {
            let duration_ms = match trigger {
                FailoverTrigger::SimulatedFailure => 0.0,
                FailoverTrigger::NodeFailure => elapsed_ms(start),
            };
            let event = FailoverEvent {
                timestamp_ms,
                trigger,
                failed_node: failed.to_string(),
                takeover_node: partner.name().to_string(),
                duration_ms,
            };

            if let Err(e) = state.record_event(event.clone()) {
                error!("failed to record failover event: {e}");
                return None;
            }

            info!(
                failed = %failed,
                takeover = %partner.name(),
                duration_ms,
                reply = %resp.message,
                "failover completed: {} -> {}",
                failed,
                partner.name()
            );
            Some(event)
        }
        Err((e, attempts)) => {
            error!(
                takeover = %partner.name(),
                attempts,
                "failed to initiate takeover on {}: {e}",
                partner.name()
            );
            None
        }
    }
}

/// Return the partner's mirrored LIFs to `recovered` once it is healthy again.
///
/// Only runs when the partner reports takeover. Order matters: the partner
/// releases its copies before the recovered node brings its own online.
#[tracing::instrument(name = "controller.giveback", skip_all, fields(recovered = %recovered))]
pub async fn giveback_handoff(state: &ControllerState, recovered: &str) -> Result<bool, ApiError> {
    let node = state
        .pair
        .get(recovered)
        .ok_or_else(|| ApiError::UnknownNode(recovered.to_string()))?;
    let partner = state
        .pair
        .partner_of(recovered)
        .ok_or_else(|| ApiError::UnknownNode(recovered.to_string()))?;

    let partner_health = partner.health().await?;
    if partner_health.status != NodeStatus::Takeover {
        debug!(partner = %partner.name(), status = %partner_health.status, "partner not in takeover, nothing to give back");
        return Ok(false);
    }

    partner.prepare_giveback().await?;
    partner.complete_giveback().await?;

    let resumed = node.resume_lifs().await.inspect_err(|e| {
        warn!(node = %recovered, "partner released LIFs but resume failed: {e}");
    })?;

    info!(
        node = %recovered,
        partner = %partner.name(),
        lifs_online = resumed.lifs_online,
        "giveback completed: {} -> {}",
        partner.name(),
        recovered
    );

    Ok(true)
}
