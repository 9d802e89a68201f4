use std::sync::Arc;

use reqwest::{Client, StatusCode};
use shared::{api::PodPatch, models::pod::Pod};
use thiserror::Error;

use super::{filter::FilterOptions, state::State};
use crate::framework::{NodeScore, NodeScoreList, PluginError, run_score_plugin};
use crate::plugins::podtopologyspread::PodTopologySpread;

#[derive(Debug, Error)]
pub enum BindError {
    #[error("patch request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("apiserver answered HTTP {0}")]
    Status(StatusCode),
}

/// Scheduling flow for a single pod: filters candidate nodes,
/// scores them, and binds the pod if a node is chosen
pub struct SchedulerFlow {
    state: State,
    pod: Arc<Pod>,
    plugin: Arc<PodTopologySpread>,
    client: Client,
    pods_uri: String,
    candidates: Vec<String>,
    pub scores: NodeScoreList,
    pub chosen: Option<String>,
    pub accepted: bool,
    pub error: Option<PluginError>,
    filter_option: FilterOptions,
}

impl SchedulerFlow {
    pub fn new(
        state: &State,
        pod: Pod,
        plugin: &Arc<PodTopologySpread>,
        client: &Client,
        pods_uri: &str,
        filter_option: Option<FilterOptions>,
    ) -> Self {
        Self {
            state: state.clone(),
            pod: Arc::new(pod),
            plugin: plugin.clone(),
            client: client.clone(),
            pods_uri: pods_uri.to_string(),
            candidates: Vec::new(),
            scores: Vec::new(),
            chosen: None,
            accepted: false,
            error: None,
            filter_option: filter_option.unwrap_or(FilterOptions::Basic),
        }
    }

    pub async fn execute(self) -> Self {
        self.filter().score().await.select().bind().await
    }

    /// Freeze the cycle snapshot and keep the feasible nodes.
    fn filter(mut self) -> Self {
        let snapshot = self.state.freeze_snapshot();
        if snapshot.is_empty() {
            tracing::debug!(pod = %self.pod.metadata.name, "No nodes in cluster");
            return self;
        }
        self.candidates = self.filter_option.filter(&snapshot, &self.pod);
        tracing::debug!(
            pod = %self.pod.metadata.name,
            nodes = snapshot.len(),
            feasible = self.candidates.len(),
            "Filtered nodes"
        );
        self
    }

    /// Run the spread plugin over the candidates. Nodes whose scoring
    /// failed are dropped, a pod-level error aborts the flow.
    async fn score(mut self) -> Self {
        if self.candidates.is_empty() {
            return self;
        }

        match run_score_plugin(self.plugin.clone(), self.pod.clone(), &self.candidates).await {
            Ok(outcome) => {
                for (node, err) in &outcome.failed {
                    tracing::warn!(
                        pod = %self.pod.metadata.name,
                        %node,
                        error = %err,
                        "Excluding node"
                    );
                }
                self.scores = outcome.scores;
            }
            Err(err) => {
                tracing::error!(pod = %self.pod.metadata.name, error = %err, "Could not score pod");
                self.error = Some(err);
            }
        }
        self
    }

    /// Pick the highest score, ties go to the first node by name.
    fn select(mut self) -> Self {
        self.chosen = pick_best(&self.scores).map(|s| s.name.clone());
        self
    }

    /// Bind the pod to the chosen node by patching the API server.
    async fn bind(mut self) -> Self {
        let Some(ref node) = self.chosen else {
            return self;
        };

        match self.patch_node_name(node).await {
            Ok(()) => {
                tracing::info!(pod = %self.pod.metadata.name, %node, "Scheduled");
                self.accepted = true;
            }
            Err(err) => {
                tracing::error!(
                    pod = %self.pod.metadata.name,
                    %node,
                    error = %err,
                    "Failed to bind pod"
                );
            }
        }
        self
    }

    async fn patch_node_name(&self, node: &str) -> Result<(), BindError> {
        let url = format!("{}/{}", self.pods_uri, self.pod.metadata.name);
        let resp = self
            .client
            .patch(&url)
            .json(&PodPatch::bind(node))
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(BindError::Status(resp.status()))
        }
    }
}

fn pick_best(scores: &[NodeScore]) -> Option<&NodeScore> {
    scores
        .iter()
        .max_by(|a, b| a.score.cmp(&b.score).then_with(|| b.name.cmp(&a.name)))
}
