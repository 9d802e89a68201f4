//! Pod topology spread scoring
//!
//! Prefers nodes whose topology domains (zone, rack, hostname...) hold
//! fewer pods matching the `ScheduleAnyway` spread constraints of the pod
//! being scheduled. `DoNotSchedule` constraints belong to filtering and are
//! ignored here.

mod args;
mod metadata;
mod scoring;

use std::sync::Arc;

use serde_json::Value;
use shared::models::pod::Pod;

use crate::framework::{
    CycleState, FrameworkHandle, NodeScoreList, Plugin, PluginError, ScoreExtensions, ScorePlugin,
    SharedLister,
};

pub use args::{PodTopologySpreadArgs, SKEW_WEIGHT_SCALE, Weighting};
pub use metadata::{ScoringConstraint, SpreadMetadata};

/// Name of the plugin used in the registry and logs.
pub const NAME: &str = "PodTopologySpread";

pub struct PodTopologySpread {
    lister: Arc<dyn SharedLister>,
    args: PodTopologySpreadArgs,
    max_score: i64,
}

impl PodTopologySpread {
    /// Builds the plugin. The handle must provide a snapshot lister.
    pub fn new(args: Option<&Value>, handle: &dyn FrameworkHandle) -> Result<Self, PluginError> {
        let lister = handle.snapshot_lister().ok_or_else(|| {
            PluginError::Configuration("snapshot shared lister is not set".to_string())
        })?;
        let args = PodTopologySpreadArgs::from_value(args)?;
        let max_score = handle.max_node_score();
        if max_score <= 0 {
            return Err(PluginError::Configuration(format!(
                "max node score must be positive, got {max_score}"
            )));
        }

        tracing::debug!(plugin = NAME, weighting = %args.weighting, max_score, "Initialized");
        Ok(Self {
            lister,
            args,
            max_score,
        })
    }

    pub fn args(&self) -> &PodTopologySpreadArgs {
        &self.args
    }
}

impl Plugin for PodTopologySpread {
    fn name(&self) -> &'static str {
        NAME
    }
}

impl ScorePlugin for PodTopologySpread {
    type CycleData = SpreadMetadata;

    fn pre_score(&self, pod: &Pod) -> Result<SpreadMetadata, PluginError> {
        SpreadMetadata::build(pod, self.lister.snapshot())
    }

    /// Raw score is the negated count of matching pods in the node's
    /// domains, normalized later.
    fn score(
        &self,
        state: &CycleState<SpreadMetadata>,
        _pod: &Pod,
        node_name: &str,
    ) -> Result<i64, PluginError> {
        let meta = state.data();
        let info = meta.snapshot().get(node_name)?;
        Ok(scoring::raw_score(meta, info.node(), self.args.weighting))
    }

    fn score_extensions(&self) -> Option<&dyn ScoreExtensions<SpreadMetadata>> {
        Some(self)
    }
}

impl ScoreExtensions<SpreadMetadata> for PodTopologySpread {
    fn normalize_score(
        &self,
        state: &CycleState<SpreadMetadata>,
        pod: &Pod,
        scores: &mut NodeScoreList,
    ) -> Result<(), PluginError> {
        if state.data().is_empty() {
            scoring::fill(scores, self.max_score);
        } else {
            scoring::normalize(scores, self.max_score);
        }
        tracing::debug!(
            cycle = state.cycle(),
            pod = %pod.metadata.name,
            nodes = scores.len(),
            "Normalized spread scores"
        );
        Ok(())
    }
}
