use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{node::Node, pod::Pod};

// ============================= EVENTS

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PodEvent {
    pub event_type: EventType,
    pub pod: Pod,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeEvent {
    pub event_type: EventType,
    pub node: Node,
}

#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub enum EventType {
    Added,
    Deleted,
    Modified,
}

// ============================= POD PATCH

#[derive(Deserialize, Serialize, Debug)]
pub struct PodPatch {
    pub pod_field: PodField,
    pub value: Value,
}

#[derive(Deserialize, Serialize, Debug, PartialEq)]
pub enum PodField {
    #[serde(rename = "node_name")]
    NodeName,
}

impl PodPatch {
    /// Patch binding a pod to `node_name`.
    pub fn bind(node_name: &str) -> Self {
        Self {
            pod_field: PodField::NodeName,
            value: Value::String(node_name.to_string()),
        }
    }
}
