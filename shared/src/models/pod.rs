use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::labels::{LabelSelector, Labels};
use crate::models::metadata::Metadata;

// --- Core ---

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Pod {
    pub metadata: Metadata,
    pub spec: PodSpec,
    pub status: PodStatus,
}

/// Desired state
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PodSpec {
    pub node_name: String,
    /// Nodes must carry every one of these labels to run the pod
    #[serde(default)]
    pub node_selector: Labels,
    #[serde(default)]
    pub topology_spread_constraints: Vec<TopologySpreadConstraint>,
    pub containers: Vec<ContainerSpec>,
}

/// Actual state
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PodStatus {
    pub phase: PodPhase,
    pub container_status: Vec<(String, String)>,
    pub last_update: Option<DateTime<Utc>>,
    pub observed_generation: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub enum PodPhase {
    Pending,
    Running,
    Unknown,
    Failed,
    Succeeded,
}

// --- Topology spread ---

/// How matching pods should be spread across a topology.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TopologySpreadConstraint {
    /// Node label key whose values define the domains
    pub topology_key: String,
    /// Tolerated difference of matching pods between any two domains
    pub max_skew: i32,
    pub when_unsatisfiable: UnsatisfiableConstraintAction,
    /// Pods counted against the constraint. `None` selects nothing
    #[serde(default)]
    pub label_selector: Option<LabelSelector>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum UnsatisfiableConstraintAction {
    /// Hard constraint, enforced when filtering nodes
    DoNotSchedule,
    /// Soft constraint, only a scoring preference
    ScheduleAnyway,
}

// --- Containers ---

/// Definition of a container within a Pod.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
}

// --- Impl ---

impl Pod {
    pub fn is_assigned(&self) -> bool {
        !self.spec.node_name.is_empty()
    }
}

impl Default for Pod {
    fn default() -> Self {
        Pod {
            metadata: Metadata::default(),
            spec: PodSpec::default(),
            status: PodStatus::default(),
        }
    }
}

impl Default for PodStatus {
    fn default() -> Self {
        PodStatus {
            phase: PodPhase::Pending,
            container_status: Vec::new(),
            last_update: None,
            observed_generation: 0,
        }
    }
}

impl Default for ContainerSpec {
    fn default() -> Self {
        ContainerSpec {
            name: "test-container".to_string(),
            image: "busybox:latest".to_string(),
        }
    }
}

impl Default for PodSpec {
    fn default() -> Self {
        PodSpec {
            node_name: "".to_string(),
            node_selector: Labels::new(),
            topology_spread_constraints: Vec::new(),
            containers: vec![ContainerSpec::default()],
        }
    }
}
