use std::collections::HashMap;
use std::sync::Arc;

use shared::models::{node::Node, pod::Pod};

use super::PluginError;

/// A node together with the pods assigned to it.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    node: Node,
    pods: Vec<Pod>,
}

impl NodeInfo {
    pub fn new(node: Node) -> Self {
        Self {
            node,
            pods: Vec::new(),
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn pods(&self) -> &[Pod] {
        &self.pods
    }
}

/// Cluster view frozen at the start of a scheduling cycle.
#[derive(Debug, Default)]
pub struct Snapshot {
    node_infos: Vec<NodeInfo>,
    index: HashMap<String, usize>,
}

impl Snapshot {
    /// Groups `pods` under their assigned node. Unassigned pods and pods
    /// bound to unknown nodes are left out.
    pub fn new(nodes: impl IntoIterator<Item = Node>, pods: impl IntoIterator<Item = Pod>) -> Self {
        let mut node_infos: Vec<NodeInfo> = nodes.into_iter().map(NodeInfo::new).collect();
        node_infos.sort_by(|a, b| a.node.name.cmp(&b.node.name));
        let index: HashMap<String, usize> = node_infos
            .iter()
            .enumerate()
            .map(|(i, info)| (info.node.name.clone(), i))
            .collect();

        for pod in pods {
            if let Some(&i) = index.get(&pod.spec.node_name) {
                node_infos[i].pods.push(pod);
            }
        }

        Self { node_infos, index }
    }

    pub fn get(&self, node_name: &str) -> Result<&NodeInfo, PluginError> {
        self.index
            .get(node_name)
            .map(|&i| &self.node_infos[i])
            .ok_or_else(|| PluginError::NodeLookup(node_name.to_string()))
    }

    /// All nodes, ordered by name.
    pub fn list(&self) -> &[NodeInfo] {
        &self.node_infos
    }

    pub fn len(&self) -> usize {
        self.node_infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_infos.is_empty()
    }
}

/// Source of cluster snapshots for plugins.
pub trait SharedLister: Send + Sync {
    /// Snapshot of the current cycle. Repeated calls within one cycle must
    /// return the same view.
    fn snapshot(&self) -> Arc<Snapshot>;
}
