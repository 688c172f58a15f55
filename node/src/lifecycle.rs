//! Transition table for a node's lifecycle status.
//!
//! Every request that mutates a node is first run through [`next_status`];
//! anything not listed in the table is rejected before the node is touched.

use common::error::ApiError;
use common::schemas::NodeStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeEvent {
    /// The node declares itself failed.
    Failover,
    /// The partner failed; absorb its LIFs.
    Takeover,
    /// The failed node reclaims its home LIFs.
    Giveback,
    /// The takeover node marks the partner's LIFs as leaving.
    PrepareGiveback,
    /// The takeover node drops the partner's LIFs and returns to normal.
    CompleteGiveback,
    /// The recovered node brings its migrating home LIFs online.
    ResumeLifs,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    To(NodeStatus),
    Unchanged,
    /// A repeated takeover; acknowledged without side effects.
    AlreadyInTakeover,
}

pub fn next_status(from: NodeStatus, event: NodeEvent) -> Result<Transition, ApiError> {
    use NodeEvent as E;
    use NodeStatus as S;

    match (from, event) {
        (S::Healthy, E::Failover) => Ok(Transition::To(S::Failed)),
        (S::Healthy, E::Takeover) => Ok(Transition::To(S::Takeover)),
        (S::Healthy, E::ResumeLifs) => Ok(Transition::Unchanged),

        (S::Takeover, E::Takeover) => Ok(Transition::AlreadyInTakeover),
        (S::Takeover, E::PrepareGiveback) => Ok(Transition::Unchanged),
        (S::Takeover, E::CompleteGiveback) => Ok(Transition::To(S::Healthy)),

        (_, E::PrepareGiveback | E::CompleteGiveback) => Err(ApiError::invalid_state(
            "node must be in takeover state for giveback",
        )),

        (S::Failed, E::Giveback) => Ok(Transition::To(S::Healthy)),
        (S::Failed, E::Failover) => Err(ApiError::invalid_state("node is already in failed state")),
        (S::Failed, _) => Err(ApiError::NodeFailed),

        (_, E::Giveback) => Err(ApiError::invalid_state(
            "node must be in failed state for giveback",
        )),
        (S::Takeover, E::Failover) => Err(ApiError::invalid_state(
            "node is serving partner LIFs and cannot fail over",
        )),
        (S::Takeover, E::ResumeLifs) => Err(ApiError::invalid_state(
            "node must be healthy to bring its LIFs online",
        )),
        (S::Giveback, _) => Err(ApiError::invalid_state("giveback in progress")),
    }
}
