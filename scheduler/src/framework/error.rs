use thiserror::Error;

/// Errors returned by plugins to the scheduler.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PluginError {
    /// Plugin cannot be built, fatal at startup
    #[error("plugin configuration error: {0}")]
    Configuration(String),

    /// A constraint of the pod is malformed, the pod cannot be scored
    #[error("invalid topology spread constraint #{index} (topologyKey={topology_key:?}): {reason}")]
    Metadata {
        index: usize,
        topology_key: String,
        reason: String,
    },

    /// Node is not part of the cycle snapshot, fails only that node
    #[error("getting node {0:?} from snapshot: node not found")]
    NodeLookup(String),

    /// Map task of a node panicked or was cancelled, fails only that node
    #[error("scoring task for node {0:?} did not complete")]
    ScoreTask(String),
}

impl PluginError {
    /// Whether the error only concerns a single node of the cycle.
    pub fn is_per_node(&self) -> bool {
        matches!(self, PluginError::NodeLookup(_) | PluginError::ScoreTask(_))
    }
}
