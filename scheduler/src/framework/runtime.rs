use std::collections::HashMap;
use std::sync::Arc;

use shared::models::pod::Pod;
use tokio::task::JoinSet;

use super::{CycleState, NodeScore, NodeScoreList, PluginError, ScorePlugin};

/// Result of scoring one pod against a set of candidate nodes.
#[derive(Debug, Default)]
pub struct ScoreOutcome {
    /// Final scores, in candidate order, without the failed nodes
    pub scores: NodeScoreList,
    /// Nodes whose map call failed
    pub failed: Vec<(String, PluginError)>,
}

/// Runs one scoring cycle of `plugin` for `pod`.
///
/// The cycle data is built first, then every node is scored on its own
/// task. Once all tasks joined, the reduce step runs exactly once over the
/// successful scores. A per-node failure, including a map task that panicked,
/// excludes that node; any other error aborts the cycle.
pub async fn run_score_plugin<P>(
    plugin: Arc<P>,
    pod: Arc<Pod>,
    nodes: &[String],
) -> Result<ScoreOutcome, PluginError>
where
    P: ScorePlugin + 'static,
{
    let state = Arc::new(CycleState::new(plugin.pre_score(&pod)?));
    tracing::debug!(
        plugin = plugin.name(),
        cycle = state.cycle(),
        pod = %pod.metadata.name,
        nodes = nodes.len(),
        "Scoring nodes"
    );

    let mut tasks = JoinSet::new();
    let mut task_nodes = HashMap::with_capacity(nodes.len());
    for (i, node_name) in nodes.iter().enumerate() {
        let plugin = plugin.clone();
        let state = state.clone();
        let pod = pod.clone();
        let name = node_name.clone();
        let handle = tasks.spawn(async move {
            let res = plugin.score(&state, &pod, &name);
            (i, name, res)
        });
        task_nodes.insert(handle.id(), node_name.clone());
    }

    // join: the reduce below must not start before every map returned
    let mut slots: Vec<Option<NodeScore>> = vec![None; nodes.len()];
    let mut failed = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((i, name, Ok(score))) => slots[i] = Some(NodeScore { name, score }),
            Ok((_, name, Err(err))) if err.is_per_node() => {
                tracing::warn!(
                    plugin = plugin.name(),
                    node = %name,
                    error = %err,
                    "Node scoring failed"
                );
                failed.push((name, err));
            }
            Ok((_, _, Err(err))) => return Err(err),
            Err(join_err) => {
                let name = task_nodes.remove(&join_err.id()).unwrap_or_default();
                tracing::error!(
                    plugin = plugin.name(),
                    node = %name,
                    error = %join_err,
                    "Score task did not complete"
                );
                failed.push((name.clone(), PluginError::ScoreTask(name)));
            }
        }
    }

    let mut scores: NodeScoreList = slots.into_iter().flatten().collect();
    if let Some(ext) = plugin.score_extensions() {
        ext.normalize_score(&state, &pod, &mut scores)?;
    }

    Ok(ScoreOutcome { scores, failed })
}
