mod filter;
mod flow;
mod state;

use std::sync::Arc;

use reqwest::Client;
use shared::api::{EventType, NodeEvent, PodEvent};
use shared::utils::watch_stream;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::Config;
use crate::framework::{FrameworkHandle, Plugin, PluginError, SharedLister};
use crate::plugins::podtopologyspread::PodTopologySpread;

pub use filter::FilterOptions;
pub use flow::{BindError, SchedulerFlow};
pub use state::{SchedulerState, State};

/// Exposes the scheduler's cluster view to plugins.
struct StateHandle(State);

impl FrameworkHandle for StateHandle {
    fn snapshot_lister(&self) -> Option<Arc<dyn SharedLister>> {
        Some(self.0.clone())
    }
}

pub struct Scheduler {
    state: State,
    plugin: Arc<PodTopologySpread>,
    client: Client,
    tx: mpsc::Sender<Uuid>,
    pods_uri: String,
    nodes_uri: String,
}

impl Scheduler {
    fn new(config: &Config) -> Result<(Arc<Self>, mpsc::Receiver<Uuid>), PluginError> {
        let state = SchedulerState::new();
        let plugin = PodTopologySpread::new(
            Some(&config.spread_args()),
            &StateHandle(state.clone()),
        )?;
        tracing::debug!(plugin = plugin.name(), "Registered score plugin");

        let (tx, rx) = mpsc::channel::<Uuid>(config.queue_capacity);
        Ok((
            Arc::new(Self {
                state,
                plugin: Arc::new(plugin),
                client: Client::new(),
                tx,
                pods_uri: format!("{}/pods", config.apiserver),
                nodes_uri: format!("{}/nodes", config.apiserver),
            }),
            rx,
        ))
    }

    /// Watches nodes and pods and schedules pending pods one at a time.
    pub async fn run(config: Config) -> Result<(), PluginError> {
        tracing::debug!("Running");
        let (sched, mut rx) = Scheduler::new(&config)?;

        let _ = tokio::try_join!(
            // Watch nodes
            {
                let sched = sched.clone();
                tokio::spawn(async move {
                    let url = format!("{}?watch=true", sched.nodes_uri);
                    let handler = sched.clone();
                    if let Err(e) = watch_stream(&sched.client, &url, move |event| {
                        handler.handle_node_event(event);
                    })
                    .await
                    {
                        tracing::error!(error = %e, "Node watch failed");
                    }
                })
            },
            // Watch pods
            {
                let sched = sched.clone();
                tokio::spawn(async move {
                    let url = format!("{}?watch=true", sched.pods_uri);
                    let handler = sched.clone();
                    if let Err(e) = watch_stream(&sched.client, &url, move |event| {
                        handler.handle_pod_event(event);
                    })
                    .await
                    {
                        tracing::error!(error = %e, "Pod watch failed");
                    }
                })
            },
            // Pull jobs and schedule pods, one cycle at a time
            {
                let sched = sched.clone();
                tokio::spawn(async move {
                    while let Some(pod_id) = rx.recv().await {
                        sched.schedule(pod_id).await;
                    }
                })
            }
        );
        Ok(())
    }

    async fn schedule(&self, id: Uuid) {
        let pod = match self.state.pods.get(&id) {
            Some(p) => p.clone(),
            None => {
                tracing::warn!(%id, "Pod not found in state");
                return;
            }
        };
        if pod.is_assigned() {
            tracing::debug!(pod = %pod.metadata.name, "Pod already bound");
            return;
        }

        let flow = SchedulerFlow::new(
            &self.state,
            pod,
            &self.plugin,
            &self.client,
            &self.pods_uri,
            None,
        )
        .execute()
        .await;

        if let (true, Some(node)) = (flow.accepted, &flow.chosen) {
            self.state.assign_pod(&id, node);
        } else if flow.error.is_none() {
            tracing::error!(%id, "Could not schedule pod");
        }
    }

    fn handle_pod_event(&self, event: PodEvent) {
        match event.event_type {
            EventType::Added => {
                self.state.add_pod(&event.pod);
                if !event.pod.is_assigned() {
                    let pod_id = event.pod.metadata.id;
                    if let Err(e) = self.tx.try_send(pod_id) {
                        tracing::warn!(%pod_id, error = %e, "Could not queue pod");
                    }
                }
            }
            EventType::Modified => self.state.add_pod(&event.pod),
            EventType::Deleted => self.state.delete_pod(&event.pod.metadata.id),
        }
    }

    fn handle_node_event(&self, event: NodeEvent) {
        match event.event_type {
            EventType::Added | EventType::Modified => {
                self.state.add_node(&event.node);
                // pods may have been waiting for a node
                for pod_id in self.state.pending_pods() {
                    if let Err(e) = self.tx.try_send(pod_id) {
                        tracing::warn!(%pod_id, error = %e, "Could not queue pending pod");
                    }
                }
            }
            EventType::Deleted => self.state.delete_node(&event.node.name),
        }
    }
}

#[cfg(test)]
mod tests {

    //! - test_handle_pod_event_schedule_pod
    //!     ensures a pod is inserted and scheduled upon receiving a pod event.
    //! - test_handle_node_event_schedule_unscheduled_pods
    //!     verifies that unscheduled pods are scheduled when a node is added.
    //! - test_replicas_spread_across_zones
    //!     consecutive replicas land in distinct zones.
    //! - test_malformed_constraint_is_not_bound / test_bind_failure_keeps_pod_pending
    //!     failed cycles leave the pod pending and never bind it.
    //! - test_full_queue_keeps_pod_pending
    //!     a pod that does not fit in the work queue stays pending.

    use super::*;
    use crate::plugins::podtopologyspread::Weighting;
    use shared::api::EventType;
    use shared::labels::{LabelSelector, LabelSelectorRequirement};
    use shared::models::pod::{TopologySpreadConstraint, UnsatisfiableConstraintAction};
    use shared::models::{node::Node, pod::Pod};
    use wiremock::matchers::{body_json, method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn start_mock_server() -> MockServer {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path_regex(r"^/pods/.*$"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        server
    }

    fn config(apiserver: String) -> Config {
        Config {
            apiserver,
            queue_capacity: 10,
            spread_weighting: Weighting::Uniform,
        }
    }

    fn zone_node(name: &str, zone: &str) -> Node {
        let mut node = Node {
            name: name.to_string(),
            ..Default::default()
        };
        node.labels.insert("zone".to_string(), zone.to_string());
        node
    }

    fn replica(name: &str) -> Pod {
        let mut pod = Pod::default();
        pod.metadata.name = name.to_string();
        pod.metadata.labels.insert("app".to_string(), "web".to_string());
        pod.spec.topology_spread_constraints = vec![TopologySpreadConstraint {
            topology_key: "zone".to_string(),
            max_skew: 1,
            when_unsatisfiable: UnsatisfiableConstraintAction::ScheduleAnyway,
            label_selector: Some(LabelSelector {
                match_labels: [("app".to_string(), "web".to_string())].into(),
                ..Default::default()
            }),
        }];
        pod
    }

    fn add_node(sched: &Scheduler, node: &Node) {
        sched.handle_node_event(NodeEvent {
            node: node.clone(),
            event_type: EventType::Added,
        });
    }

    fn add_pod(sched: &Scheduler, pod: &Pod) {
        sched.handle_pod_event(PodEvent {
            pod: pod.clone(),
            event_type: EventType::Added,
        });
    }

    #[tokio::test]
    async fn test_handle_pod_event_schedule_pod() {
        // Setup state and mocked patch endpoint
        let mock_server = start_mock_server().await;
        let (sched, mut rx) = Scheduler::new(&config(mock_server.uri())).unwrap();

        let pod = Pod::default();
        let node = Node::default();

        // Simulate node and pod event
        add_node(&sched, &node);
        add_pod(&sched, &pod);

        // Verify pod is queued and eventually scheduled
        assert!(sched.state.pods.contains_key(&pod.metadata.id));

        let to_be_scheduled_pod_id = rx.recv().await.expect("Expected pod ID");
        assert_eq!(to_be_scheduled_pod_id, pod.metadata.id);

        sched.schedule(pod.metadata.id).await;

        let node_pods = sched.state.pod_map.get(&node.name);
        assert!(sched.state.nodes.contains_key(&node.name));
        assert!(node_pods.unwrap().contains(&pod.metadata.id));
    }

    #[tokio::test]
    async fn test_handle_node_event_schedule_unscheduled_pods() {
        let mock_server = start_mock_server().await;
        let (sched, mut rx) = Scheduler::new(&config(mock_server.uri())).unwrap();

        // Simulate pod being added before any nodes exist
        let pod = Pod::default();
        add_pod(&sched, &pod);
        // replicate worker
        {
            let sched = sched.clone();
            tokio::spawn(async move {
                while let Some(pod_id) = rx.recv().await {
                    sched.schedule(pod_id).await;
                }
            });
        }

        // Validate pod is marked as unscheduled
        assert!(sched.state.pending_pods().contains(&pod.metadata.id));

        // Add node and verify scheduling occurs
        let node = Node::default();
        add_node(&sched, &node);

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let node_pods = sched.state.pod_map.get(&node.name);
        assert!(node_pods.unwrap().contains(&pod.metadata.id));
        assert!(!sched.state.pending_pods().contains(&pod.metadata.id));
    }

    #[tokio::test]
    async fn test_replicas_spread_across_zones() {
        let mock_server = start_mock_server().await;
        let (sched, _rx) = Scheduler::new(&config(mock_server.uri())).unwrap();

        for (name, zone) in [("n-a", "a"), ("n-b", "b"), ("n-c", "c")] {
            add_node(&sched, &zone_node(name, zone));
        }
        // zone a already runs two replicas, zone b one
        for (i, node) in ["n-a", "n-a", "n-b"].iter().enumerate() {
            let mut running = replica(&format!("web-running-{i}"));
            running.spec.node_name = node.to_string();
            add_pod(&sched, &running);
        }

        let mut placed = Vec::new();
        for i in 0..3 {
            let pod = replica(&format!("web-{i}"));
            add_pod(&sched, &pod);
            sched.schedule(pod.metadata.id).await;
            placed.push(sched.state.pods.get(&pod.metadata.id).unwrap().spec.node_name.clone());
        }

        // c is empty, then b and c tie at one replica each (b wins by name),
        // then c is the least crowded again
        assert_eq!(placed, vec!["n-c", "n-b", "n-c"]);
    }

    #[tokio::test]
    async fn test_bind_sends_node_name_patch() {
        let mock_server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/pods/web-0"))
            .and(body_json(serde_json::json!({"pod_field": "node_name", "value": "n-b"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;
        let (sched, _rx) = Scheduler::new(&config(mock_server.uri())).unwrap();

        add_node(&sched, &zone_node("n-a", "a"));
        add_node(&sched, &zone_node("n-b", "b"));
        let mut running = replica("web-running");
        running.spec.node_name = "n-a".to_string();
        add_pod(&sched, &running);

        let pod = replica("web-0");
        add_pod(&sched, &pod);
        sched.schedule(pod.metadata.id).await;

        assert_eq!(sched.state.pods.get(&pod.metadata.id).unwrap().spec.node_name, "n-b");
    }

    #[tokio::test]
    async fn test_malformed_constraint_is_not_bound() {
        let mock_server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;
        let (sched, _rx) = Scheduler::new(&config(mock_server.uri())).unwrap();
        add_node(&sched, &zone_node("n-a", "a"));

        let mut pod = replica("web-bad");
        pod.spec.topology_spread_constraints[0].label_selector = Some(LabelSelector {
            match_expressions: vec![LabelSelectorRequirement {
                key: "app".to_string(),
                operator: "In".to_string(),
                values: Vec::new(),
            }],
            ..Default::default()
        });
        add_pod(&sched, &pod);
        sched.schedule(pod.metadata.id).await;

        assert!(sched.state.pending_pods().contains(&pod.metadata.id));
    }

    #[tokio::test]
    async fn test_bind_failure_keeps_pod_pending() {
        let mock_server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(409))
            .expect(1)
            .mount(&mock_server)
            .await;
        let (sched, _rx) = Scheduler::new(&config(mock_server.uri())).unwrap();
        add_node(&sched, &zone_node("n-a", "a"));

        let pod = replica("web-0");
        add_pod(&sched, &pod);
        sched.schedule(pod.metadata.id).await;

        assert!(sched.state.pending_pods().contains(&pod.metadata.id));
    }

    #[tokio::test]
    async fn test_full_queue_keeps_pod_pending() {
        let mock_server = start_mock_server().await;
        let mut cfg = config(mock_server.uri());
        cfg.queue_capacity = 1;
        let (sched, mut rx) = Scheduler::new(&cfg).unwrap();

        let first = replica("web-0");
        let second = replica("web-1");
        for pod in [&first, &second] {
            sched.handle_pod_event(PodEvent {
                event_type: EventType::Added,
                pod: pod.clone(),
            });
        }

        // only the first fits, the second stays tracked as pending
        assert_eq!(rx.try_recv().unwrap(), first.metadata.id);
        assert!(rx.try_recv().is_err());
        assert!(sched.state.pending_pods().contains(&second.metadata.id));
    }

    #[tokio::test]
    async fn test_deleted_events_untrack_objects() {
        let mock_server = start_mock_server().await;
        let (sched, _rx) = Scheduler::new(&config(mock_server.uri())).unwrap();
        let node = zone_node("n-a", "a");
        let pod = replica("web-0");
        add_node(&sched, &node);
        add_pod(&sched, &pod);

        sched.handle_pod_event(PodEvent {
            event_type: EventType::Deleted,
            pod: pod.clone(),
        });
        sched.handle_node_event(NodeEvent {
            event_type: EventType::Deleted,
            node: node.clone(),
        });

        assert!(!sched.state.pods.contains_key(&pod.metadata.id));
        assert!(!sched.state.nodes.contains_key(&node.name));
    }
}
