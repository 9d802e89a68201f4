use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::labels::Labels;

/// Hostname label every node carries by default.
pub const LABEL_HOSTNAME: &str = "kubernetes.io/hostname";

/// Represents a node in the cluster.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Node {
    pub id: Uuid,
    pub name: String,
    pub status: NodeStatus,
    pub addr: String,
    /// Topology and placement labels (zone, rack, hostname...)
    #[serde(default)]
    pub labels: Labels,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

/// Status of a node in the cluster.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum NodeStatus {
    Ready,
    Running,
    Stopped,
}

impl Node {
    /// Value of a topology label, `None` if the node is outside that topology.
    pub fn topology_value(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn is_schedulable(&self) -> bool {
        matches!(self.status, NodeStatus::Ready | NodeStatus::Running)
    }
}

impl Default for Node {
    fn default() -> Self {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let name = format!("node-{}", id);
        let mut labels = Labels::new();
        labels.insert(LABEL_HOSTNAME.to_string(), name.clone());
        Node {
            id,
            name,
            status: NodeStatus::Ready,
            addr: "127.0.0.1:10250".to_string(),
            labels,
            started_at: now,
            last_heartbeat: now,
        }
    }
}
