//! Network transport contract for vote bundles.
//!
//! Outbound sends are fire-and-forget. Inbound bundles are checked here for
//! structure only (non-empty, one round); signatures are the gate's business.

use crate::consensus::cluster_order::Peer;
use crate::consensus::round::Round;
use crate::consensus::types::VoteMessage;
use crate::utils::metrics::{self, METRICS};
use std::fmt;
use tracing::info;

/// Outbound side: deliver a bundle to one peer. Must not block the caller;
/// failures are logged by the implementation and never retried here.
pub trait YacNetwork: Send + Sync + 'static {
    fn send_state(&self, to: &Peer, state: Vec<VoteMessage>);
}

/// Inbound side: receives structurally valid bundles
pub trait YacNetworkNotifications: Send + Sync + 'static {
    fn on_state(&self, state: Vec<VoteMessage>);
}

/// Why an inbound bundle was dropped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BundleRejection {
    Empty,
    MixedRounds,
}

impl fmt::Display for BundleRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleRejection::Empty => f.write_str("empty votes collection"),
            BundleRejection::MixedRounds => f.write_str("votes reference different rounds"),
        }
    }
}

/// Round shared by every vote of the bundle
pub fn validate_state(state: &[VoteMessage]) -> Result<Round, BundleRejection> {
    let first = state.first().ok_or(BundleRejection::Empty)?.round();
    if state.iter().any(|v| v.round() != first) {
        return Err(BundleRejection::MixedRounds);
    }
    Ok(first)
}

/// Validate and hand a received bundle to `handler`. Invalid bundles are dropped
/// without any answer to the sender. Returns whether the bundle was forwarded.
pub fn deliver_state(state: Vec<VoteMessage>, from: &str, handler: &dyn YacNetworkNotifications) -> bool {
    METRICS.inc_counter(metrics::BUNDLES_RECEIVED);
    match validate_state(&state) {
        Ok(round) => {
            info!("Received votes[size={}] for round {} from {}", state.len(), round, from);
            handler.on_state(state);
            true
        }
        Err(reason) => {
            METRICS.inc_counter(metrics::BUNDLES_DROPPED);
            info!("Dropping votes bundle from {}: {}", from, reason);
            false
        }
    }
}
