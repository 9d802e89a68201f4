use dashmap::{DashMap, DashSet};
use shared::models::{node::Node, pod::Pod};
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

use crate::framework::{SharedLister, Snapshot};

pub type State = Arc<SchedulerState>;

/// In-memory cluster view shared across tasks.
#[derive(Debug, Default)]
pub struct SchedulerState {
    pub nodes: DashMap<String, Node>,
    pub pods: DashMap<Uuid, Pod>,
    /// Node name to pod ids, `""` holds pending pods
    pub pod_map: DashMap<String, DashSet<Uuid>>,
    /// Frozen view of the cycle in flight
    cycle_snapshot: RwLock<Arc<Snapshot>>,
}

impl SchedulerState {
    pub fn new() -> State {
        Arc::new(Self::default())
    }

    /// Tracks a pod, pending or already bound.
    pub fn add_pod(&self, pod: &Pod) {
        self.untrack(&pod.metadata.id);
        self.pods.insert(pod.metadata.id, pod.clone());
        self.pod_map
            .entry(pod.spec.node_name.clone())
            .or_insert_with(DashSet::new)
            .insert(pod.metadata.id);
    }

    pub fn delete_pod(&self, id: &Uuid) {
        if self.untrack(id).is_none() {
            tracing::warn!(%id, "Failed to delete pod");
        }
    }

    pub fn add_node(&self, node: &Node) {
        self.nodes.insert(node.name.clone(), node.clone());
    }

    /// Forgets a node. Its pods stay tracked until their own delete event.
    pub fn delete_node(&self, name: &str) {
        if self.nodes.remove(name).is_none() {
            tracing::warn!(node = %name, "Failed to delete node");
        }
    }

    pub fn assign_pod(&self, id: &Uuid, node: &str) {
        let Some(mut pod) = self.pods.get(id).map(|p| p.clone()) else {
            tracing::warn!(%id, "Cannot assign untracked pod");
            return;
        };
        pod.spec.node_name = node.to_string();
        self.add_pod(&pod);
    }

    pub fn pending_pods(&self) -> Vec<Uuid> {
        self.pod_map
            .get("")
            .map(|set| set.iter().map(|id| *id).collect())
            .unwrap_or_default()
    }

    /// Freezes the current nodes and bound pods as the snapshot of a new
    /// cycle. Plugins read it through [`SharedLister`] until the next call.
    pub fn freeze_snapshot(&self) -> Arc<Snapshot> {
        let nodes: Vec<Node> = self.nodes.iter().map(|e| e.value().clone()).collect();
        let pods: Vec<Pod> = self
            .pods
            .iter()
            .filter(|e| e.value().is_assigned())
            .map(|e| e.value().clone())
            .collect();
        let snapshot = Arc::new(Snapshot::new(nodes, pods));
        *self
            .cycle_snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
        snapshot
    }

    /// Removes a pod from the pod map and its node bucket.
    fn untrack(&self, id: &Uuid) -> Option<Pod> {
        let (_, pod) = self.pods.remove(id)?;
        if let Some(set) = self.pod_map.get(&pod.spec.node_name) {
            set.remove(id);
        }
        Some(pod)
    }
}

impl SharedLister for SchedulerState {
    fn snapshot(&self) -> Arc<Snapshot> {
        self.cycle_snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> Node {
        Node {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn assign_moves_pod_between_buckets() {
        let state = SchedulerState::new();
        let pod = Pod::default();
        state.add_node(&node("n1"));
        state.add_pod(&pod);
        assert_eq!(state.pending_pods(), vec![pod.metadata.id]);

        state.assign_pod(&pod.metadata.id, "n1");

        assert!(state.pending_pods().is_empty());
        assert!(state.pod_map.get("n1").unwrap().contains(&pod.metadata.id));
        assert_eq!(state.pods.get(&pod.metadata.id).unwrap().spec.node_name, "n1");
    }

    #[test]
    fn delete_pod_clears_bucket() {
        let state = SchedulerState::new();
        let mut pod = Pod::default();
        pod.spec.node_name = "n1".to_string();
        state.add_pod(&pod);

        state.delete_pod(&pod.metadata.id);

        assert!(!state.pods.contains_key(&pod.metadata.id));
        assert!(!state.pod_map.get("n1").unwrap().contains(&pod.metadata.id));
    }

    #[test]
    fn snapshot_is_frozen_per_cycle() {
        let state = SchedulerState::new();
        state.add_node(&node("n1"));
        let mut bound = Pod::default();
        bound.spec.node_name = "n1".to_string();
        state.add_pod(&bound);
        state.add_pod(&Pod::default());

        let frozen = state.freeze_snapshot();
        assert_eq!(frozen.get("n1").unwrap().pods().len(), 1);

        // later changes are invisible until the next cycle
        state.add_node(&node("n2"));
        assert_eq!(state.snapshot().len(), 1);
        assert!(Arc::ptr_eq(&frozen, &state.snapshot()));

        assert_eq!(state.freeze_snapshot().len(), 2);
    }
}
