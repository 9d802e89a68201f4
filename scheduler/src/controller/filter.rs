use shared::labels::labels_match;
use shared::models::pod::Pod;

use crate::framework::Snapshot;

pub enum FilterOptions {
    /// Node accepts pods and carries every label of the pod's node selector
    Basic,
}

impl FilterOptions {
    /// Names of the feasible nodes, in snapshot order.
    pub fn filter(&self, snapshot: &Snapshot, pod: &Pod) -> Vec<String> {
        match self {
            FilterOptions::Basic => snapshot
                .list()
                .iter()
                .map(|info| info.node())
                .filter(|node| node.is_schedulable())
                .filter(|node| labels_match(&pod.spec.node_selector, &node.labels))
                .map(|node| node.name.clone())
                .collect(),
        }
    }
}
