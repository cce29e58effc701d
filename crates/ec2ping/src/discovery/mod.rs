//! Discovery Lifecycle
//!
//! Gates the resolution pipeline behind a small state machine:
//! 1. Uninitialized: configured, nothing fetched yet
//! 2. Initializing: identity, credentials, inventory client, tag validation
//! 3. Ready: rounds may run, concurrently if the caller wishes
//! 4. Stopped: context released
//!
//! Any init failure lands in the terminal `Failed` state.

mod lifecycle;
mod round;

pub use lifecycle::DiscoveryLifecycle;
pub use round::{resolve_round, DiscoveryContext, RoundOutcome};

use crate::endpoints::CandidateEndpoint;
use async_trait::async_trait;
use strum::Display;

/// Lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleState {
    /// Constructed; `init` has not run
    Uninitialized,
    /// `init` in progress
    Initializing,
    /// Context built; rounds allowed
    Ready,
    /// Context released by `stop`
    Stopped,
    /// `init` failed; terminal
    Failed,
}

/// Source of candidate endpoints for one discovery round.
///
/// Implementations never fail: round errors are logged and yield an empty list.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn fetch_cluster_members(&self) -> Vec<CandidateEndpoint>;
}
