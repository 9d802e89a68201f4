//! Scheduling framework
//!
//! Extension points are capability traits: a plugin implements [`Plugin`]
//! plus whichever phases it takes part in. Scoring is two-phase: a per-node
//! map ([`ScorePlugin::score`]) fanned out over the candidates, then one
//! reduce over the whole list ([`ScoreExtensions::normalize_score`]).

mod cycle_state;
mod error;
mod runtime;
mod snapshot;

use std::sync::Arc;

use shared::models::pod::Pod;

pub use cycle_state::CycleState;
pub use error::PluginError;
pub use runtime::{ScoreOutcome, run_score_plugin};
pub use snapshot::{NodeInfo, SharedLister, Snapshot};

/// Upper bound of the canonical score range, final scores are `0..=MAX_NODE_SCORE`.
pub const MAX_NODE_SCORE: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeScore {
    pub name: String,
    pub score: i64,
}

pub type NodeScoreList = Vec<NodeScore>;

/// What the scheduler hands to plugins when they are built.
pub trait FrameworkHandle {
    /// Access to the cluster snapshot, `None` when the host has none wired.
    fn snapshot_lister(&self) -> Option<Arc<dyn SharedLister>>;

    fn max_node_score(&self) -> i64 {
        MAX_NODE_SCORE
    }
}

pub trait Plugin: Send + Sync {
    /// Name used for registration and logs.
    fn name(&self) -> &'static str;
}

pub trait ScorePlugin: Plugin {
    /// Data computed once per cycle before any node is scored.
    type CycleData: Send + Sync + 'static;

    /// Builds the cycle data for `pod`. Runs once, before the map phase.
    fn pre_score(&self, pod: &Pod) -> Result<Self::CycleData, PluginError>;

    /// Raw score of one node, only comparable within the same cycle.
    fn score(
        &self,
        state: &CycleState<Self::CycleData>,
        pod: &Pod,
        node_name: &str,
    ) -> Result<i64, PluginError>;

    /// `Some` when raw scores must go through the reduce step.
    fn score_extensions(&self) -> Option<&dyn ScoreExtensions<Self::CycleData>>;
}

pub trait ScoreExtensions<T>: Send + Sync {
    /// Rescales every score of the cycle in place, called once after all
    /// map calls returned.
    fn normalize_score(
        &self,
        state: &CycleState<T>,
        pod: &Pod,
        scores: &mut NodeScoreList,
    ) -> Result<(), PluginError>;
}
