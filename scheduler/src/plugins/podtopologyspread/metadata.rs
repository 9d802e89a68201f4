use std::collections::HashMap;
use std::sync::Arc;

use shared::labels::{Selector, labels_match};
use shared::models::pod::{Pod, TopologySpreadConstraint, UnsatisfiableConstraintAction};

use crate::framework::{PluginError, Snapshot};

/// A `ScheduleAnyway` constraint with its selector compiled.
#[derive(Debug, Clone)]
pub struct ScoringConstraint {
    pub topology_key: String,
    pub max_skew: i32,
    pub selector: Selector,
}

/// Cycle data of the spread plugin: the pod's soft constraints and, for
/// each of them, how many matching pods every topology domain holds.
#[derive(Debug)]
pub struct SpreadMetadata {
    constraints: Vec<ScoringConstraint>,
    /// Parallel to `constraints`, domain value -> matching pods
    domain_counts: Vec<HashMap<String, i64>>,
    snapshot: Arc<Snapshot>,
}

impl SpreadMetadata {
    /// Compiles the soft constraints of `pod` and counts matching pods per
    /// domain over `snapshot`.
    ///
    /// Only pods of the same namespace that are not terminating are
    /// counted, and only on nodes satisfying the pod's node selector.
    pub fn build(pod: &Pod, snapshot: Arc<Snapshot>) -> Result<Self, PluginError> {
        let constraints = soft_constraints(pod)?;
        let mut domain_counts = vec![HashMap::new(); constraints.len()];

        if !constraints.is_empty() {
            for info in snapshot.list() {
                let node = info.node();
                if !labels_match(&pod.spec.node_selector, &node.labels) {
                    continue;
                }
                for (constraint, counts) in constraints.iter().zip(domain_counts.iter_mut()) {
                    let Some(value) = node.topology_value(&constraint.topology_key) else {
                        continue;
                    };
                    let matching = count_matching(info.pods(), pod, &constraint.selector);
                    *counts.entry(value.to_string()).or_insert(0) += matching;
                }
            }
        }

        tracing::debug!(
            pod = %pod.metadata.name,
            constraints = constraints.len(),
            nodes = snapshot.len(),
            "Built spread metadata"
        );

        Ok(Self {
            constraints,
            domain_counts,
            snapshot,
        })
    }

    /// True when the pod has no soft constraint, every node then scores the same.
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn constraints(&self) -> &[ScoringConstraint] {
        &self.constraints
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Matching pods in domain `value` of constraint `index`.
    pub fn matching_in_domain(&self, index: usize, value: &str) -> i64 {
        self.domain_counts
            .get(index)
            .and_then(|counts| counts.get(value))
            .copied()
            .unwrap_or(0)
    }
}

fn soft_constraints(pod: &Pod) -> Result<Vec<ScoringConstraint>, PluginError> {
    pod.spec
        .topology_spread_constraints
        .iter()
        .enumerate()
        .filter(|(_, c)| c.when_unsatisfiable == UnsatisfiableConstraintAction::ScheduleAnyway)
        .map(|(index, c)| compile(index, c))
        .collect()
}

fn compile(
    index: usize,
    constraint: &TopologySpreadConstraint,
) -> Result<ScoringConstraint, PluginError> {
    let invalid = |reason: String| PluginError::Metadata {
        index,
        topology_key: constraint.topology_key.clone(),
        reason,
    };

    if constraint.topology_key.is_empty() {
        return Err(invalid("topology key is empty".to_string()));
    }
    if constraint.max_skew <= 0 {
        return Err(invalid(format!(
            "max skew must be positive, got {}",
            constraint.max_skew
        )));
    }
    let selector = Selector::from_label_selector(constraint.label_selector.as_ref())
        .map_err(|e| invalid(format!("label selector: {e}")))?;

    Ok(ScoringConstraint {
        topology_key: constraint.topology_key.clone(),
        max_skew: constraint.max_skew,
        selector,
    })
}

fn count_matching(pods: &[Pod], incoming: &Pod, selector: &Selector) -> i64 {
    pods.iter()
        .filter(|p| {
            p.metadata.namespace == incoming.metadata.namespace
                && !p.metadata.is_terminating()
                && selector.matches(&p.metadata.labels)
        })
        .count() as i64
}
