//! Workflow runner
//!
//! Drives a run end to end: builds the dependency graph, computes layers,
//! then executes layer by layer. Nodes of one layer run concurrently on the
//! calling task; the next layer starts only after every node of the current
//! one has finished. Outputs and errors are owned here and written only once
//! a layer has settled, so nodes never observe a sibling's results.
//!
//! The first failing node stops the run. Nodes already in flight in the same
//! layer finish and keep their outputs; no further work is scheduled.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::{self, StreamExt};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};

use crate::config::RunnerConfig;
use crate::error::{EngineError, Result};
use crate::events::{EventSink, Progress, WorkflowEvent};
use crate::graph::{build_dependency_graph, upstream_closure};
use crate::layering::{compute_execution_layers, ExecutionLayers};
use crate::registry::NodeRegistry;
use crate::resolver::resolve_node_inputs;
use crate::types::{GraphEdge, GraphNode, NodeId, NodeInputs, NodeOutput, NodeOutputs, WorkflowDocument};

/// Outcome of one run, created fresh per invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    /// Execution ID shared by every event of this run
    pub execution_id: String,
    /// Whether every node completed
    pub success: bool,
    /// Nodes that completed
    pub completed_count: usize,
    /// Nodes in the run (the scoped set for single-node runs)
    pub total_count: usize,
    /// Outputs of completed nodes
    pub node_outputs: NodeOutputs,
    /// Error message per failed node
    pub node_errors: HashMap<NodeId, String>,
    /// Top-level error message if the run failed
    pub error: Option<String>,
    /// Wall-clock time in milliseconds
    pub execution_time_ms: u64,
}

impl RunResult {
    /// Whether the node produced outputs in this run
    pub fn executed(&self, node_id: &str) -> bool {
        self.node_outputs.contains_key(node_id)
    }
}

/// Mutable bookkeeping for a run in progress
struct RunState {
    outputs: NodeOutputs,
    errors: HashMap<NodeId, String>,
    completed: usize,
    total: usize,
    first_failure: Option<String>,
}

impl RunState {
    fn new(total: usize) -> Self {
        Self {
            outputs: NodeOutputs::new(),
            errors: HashMap::new(),
            completed: 0,
            total,
            first_failure: None,
        }
    }
}

/// Executes workflows against a node registry
pub struct WorkflowRunner {
    registry: Arc<NodeRegistry>,
    config: RunnerConfig,
}

impl WorkflowRunner {
    /// Create a runner with default configuration
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            registry,
            config: RunnerConfig::default(),
        }
    }

    /// Replace the runner configuration
    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Get a reference to the node registry
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Get the runner configuration
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run every node of the workflow
    pub async fn run_workflow_dag(
        &self,
        nodes: &[GraphNode],
        edges: &[GraphEdge],
        event_sink: &dyn EventSink,
    ) -> RunResult {
        let execution_id = self.next_execution_id();
        self.run_graph(execution_id, nodes, edges, event_sink).await
    }

    /// Run a node together with everything it transitively depends on
    ///
    /// Nodes downstream of, or unrelated to, the target are never executed.
    pub async fn run_single_node(
        &self,
        node_id: &str,
        nodes: &[GraphNode],
        edges: &[GraphEdge],
        event_sink: &dyn EventSink,
    ) -> RunResult {
        let execution_id = self.next_execution_id();
        let start_time = Instant::now();

        if !nodes.iter().any(|n| n.id == node_id) {
            return self.construction_failure(
                &execution_id,
                0,
                EngineError::NodeNotFound(node_id.to_string()),
                start_time,
                event_sink,
            );
        }

        let graph = build_dependency_graph(nodes, edges);
        let mut scope = upstream_closure(node_id, &graph);
        scope.insert(node_id.to_string());

        let scoped_nodes: Vec<GraphNode> = nodes
            .iter()
            .filter(|n| scope.contains(&n.id))
            .cloned()
            .collect();
        let scoped_edges: Vec<GraphEdge> = edges
            .iter()
            .filter(|e| scope.contains(&e.source) && scope.contains(&e.target))
            .cloned()
            .collect();

        log::debug!(
            "Single-node run for '{}': {} of {} nodes in scope",
            node_id,
            scoped_nodes.len(),
            nodes.len()
        );

        self.run_graph(execution_id, &scoped_nodes, &scoped_edges, event_sink)
            .await
    }

    /// Run every node of a loaded workflow document
    pub async fn run_document(
        &self,
        document: &WorkflowDocument,
        event_sink: &dyn EventSink,
    ) -> RunResult {
        log::info!("Running workflow '{}' ({})", document.name, document.id);
        self.run_workflow_dag(&document.nodes, &document.edges, event_sink)
            .await
    }

    async fn run_graph(
        &self,
        execution_id: String,
        nodes: &[GraphNode],
        edges: &[GraphEdge],
        event_sink: &dyn EventSink,
    ) -> RunResult {
        let start_time = Instant::now();
        let graph = build_dependency_graph(nodes, edges);
        let layers = match compute_execution_layers(nodes, &graph) {
            Ok(layers) => layers,
            Err(e) => {
                return self.construction_failure(
                    &execution_id,
                    nodes.len(),
                    e,
                    start_time,
                    event_sink,
                )
            }
        };

        log::info!(
            "Execution {}: {} nodes in {} layers",
            execution_id,
            nodes.len(),
            layers.len()
        );
        self.emit(
            event_sink,
            WorkflowEvent::RunStarted {
                execution_id: execution_id.clone(),
                total_nodes: nodes.len(),
                layer_count: layers.len(),
            },
        );

        let mut state = RunState::new(nodes.len());
        self.execute_layers(&execution_id, &layers, edges, &mut state, event_sink)
            .await;

        let elapsed = start_time.elapsed().as_millis() as u64;
        match state.first_failure.take() {
            Some(error) => {
                log::warn!("Execution {} failed: {}", execution_id, error);
                self.emit(
                    event_sink,
                    WorkflowEvent::RunFailed {
                        execution_id: execution_id.clone(),
                        error: error.clone(),
                    },
                );
                RunResult {
                    execution_id,
                    success: false,
                    completed_count: state.completed,
                    total_count: state.total,
                    node_outputs: state.outputs,
                    node_errors: state.errors,
                    error: Some(error),
                    execution_time_ms: elapsed,
                }
            }
            None => {
                log::info!(
                    "Execution {} completed {} nodes in {}ms",
                    execution_id,
                    state.completed,
                    elapsed
                );
                self.emit(
                    event_sink,
                    WorkflowEvent::RunCompleted {
                        execution_id: execution_id.clone(),
                        completed: state.completed,
                    },
                );
                RunResult {
                    execution_id,
                    success: true,
                    completed_count: state.completed,
                    total_count: state.total,
                    node_outputs: state.outputs,
                    node_errors: state.errors,
                    error: None,
                    execution_time_ms: elapsed,
                }
            }
        }
    }

    /// Execute layers in order until one of them records a failure
    ///
    /// Start events for a layer are all sent before any of its nodes run, so
    /// nodes ahead of a rejected start still execute. A node skipped because a
    /// sibling already failed has a start event but no completion or failure.
    async fn execute_layers(
        &self,
        execution_id: &str,
        layers: &ExecutionLayers<'_>,
        edges: &[GraphEdge],
        state: &mut RunState,
        event_sink: &dyn EventSink,
    ) {
        for (index, layer) in layers.iter().enumerate() {
            log::debug!(
                "Execution {}: layer {} with {} nodes",
                execution_id,
                index,
                layer.len()
            );

            let mut scheduled: Vec<(&GraphNode, NodeInputs)> = Vec::with_capacity(layer.len());
            let mut start_failure = None;
            for node in layer {
                let started = WorkflowEvent::NodeStarted {
                    execution_id: execution_id.to_string(),
                    node_id: node.id.clone(),
                    node_type: node.node_type.clone(),
                };
                if let Err(e) = event_sink.send(started) {
                    start_failure = Some((*node, EngineError::from(e)));
                    break;
                }
                scheduled.push((*node, resolve_node_inputs(node, edges, &state.outputs)));
            }

            let results = self.execute_scheduled(scheduled).await;

            for (node, result) in results {
                match result {
                    Ok(outputs) => self.record_success(execution_id, node, outputs, state, event_sink),
                    Err(e) => self.record_failure(execution_id, node, e, state, event_sink),
                }
            }
            if let Some((node, error)) = start_failure {
                self.record_failure(execution_id, node, error, state, event_sink);
            }

            if state.first_failure.is_some() {
                return;
            }
        }
    }

    /// Run scheduled nodes concurrently; results keep the scheduling order
    ///
    /// Once a node fails, nodes not yet dispatched are skipped and left out
    /// of the results. Nodes already running finish normally.
    async fn execute_scheduled<'a>(
        &self,
        scheduled: Vec<(&'a GraphNode, NodeInputs)>,
    ) -> Vec<(&'a GraphNode, Result<NodeOutput>)> {
        let limit = self.config.concurrency_for(scheduled.len());
        let registry = self.registry.as_ref();
        let failed = AtomicBool::new(false);
        let failed = &failed;

        // `buffered` pulls the next node only when a slot frees up, so the
        // flag is read at dispatch time.
        let results: Vec<(&GraphNode, Option<Result<NodeOutput>>)> = stream::iter(scheduled)
            .map(|(node, inputs)| {
                let dispatch = !failed.load(Ordering::SeqCst);
                async move {
                    if !dispatch {
                        log::debug!("Skipping node '{}': a sibling already failed", node.id);
                        return (node, None);
                    }
                    let result = AssertUnwindSafe(registry.execute(node, inputs))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| {
                            let reason = panic
                                .downcast_ref::<&str>()
                                .map(|s| s.to_string())
                                .or_else(|| panic.downcast_ref::<String>().cloned())
                                .unwrap_or_else(|| "unknown panic".to_string());
                            Err(EngineError::execution(&node.id, format!("node panicked: {reason}")))
                        });
                    if result.is_err() {
                        failed.store(true, Ordering::SeqCst);
                    }
                    (node, Some(result))
                }
            })
            .buffered(limit)
            .collect()
            .await;

        results
            .into_iter()
            .filter_map(|(node, result)| result.map(|r| (node, r)))
            .collect()
    }

    fn record_success(
        &self,
        execution_id: &str,
        node: &GraphNode,
        outputs: NodeOutput,
        state: &mut RunState,
        event_sink: &dyn EventSink,
    ) {
        state.outputs.insert(node.id.clone(), outputs.clone());

        let completed = WorkflowEvent::NodeCompleted {
            execution_id: execution_id.to_string(),
            node_id: node.id.clone(),
            outputs,
        };
        if let Err(e) = event_sink.send(completed) {
            self.record_failure(execution_id, node, e.into(), state, event_sink);
            return;
        }

        // Counted only once the progress report is accepted.
        let progress = Progress::new(state.completed + 1, state.total);
        match event_sink.send(WorkflowEvent::progress(execution_id, progress)) {
            Ok(()) => state.completed += 1,
            Err(e) => self.record_failure(execution_id, node, e.into(), state, event_sink),
        }
    }

    fn record_failure(
        &self,
        execution_id: &str,
        node: &GraphNode,
        error: EngineError,
        state: &mut RunState,
        event_sink: &dyn EventSink,
    ) {
        let message = error.to_string();
        log::warn!("Node '{}' failed: {}", node.id, message);
        if state.first_failure.is_none() {
            state.first_failure = Some(format!("Node {} failed: {}", node.id, message));
        }
        state.errors.insert(node.id.clone(), message.clone());
        self.emit(
            event_sink,
            WorkflowEvent::NodeFailed {
                execution_id: execution_id.to_string(),
                node_id: node.id.clone(),
                error: message,
            },
        );
    }

    /// Failed result for errors raised before any node ran
    fn construction_failure(
        &self,
        execution_id: &str,
        total: usize,
        error: EngineError,
        start_time: Instant,
        event_sink: &dyn EventSink,
    ) -> RunResult {
        debug_assert!(error.is_construction_error(), "not a construction error: {error}");
        let message = error.to_string();
        log::warn!("Execution {} aborted: {}", execution_id, message);
        self.emit(
            event_sink,
            WorkflowEvent::RunFailed {
                execution_id: execution_id.to_string(),
                error: message.clone(),
            },
        );
        RunResult {
            execution_id: execution_id.to_string(),
            success: false,
            completed_count: 0,
            total_count: total,
            node_outputs: NodeOutputs::new(),
            node_errors: HashMap::new(),
            error: Some(message),
            execution_time_ms: start_time.elapsed().as_millis() as u64,
        }
    }

    /// Send a run-level event; rejection is logged, not fatal
    fn emit(&self, event_sink: &dyn EventSink, event: WorkflowEvent) {
        if let Err(e) = event_sink.send(event) {
            log::debug!("Event sink rejected run event: {}", e);
        }
    }

    fn next_execution_id(&self) -> String {
        format!("{}-{}", self.config.execution_id_prefix, uuid::Uuid::new_v4())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunnerConfig;
    use crate::events::{CallbackSink, ChannelEventSink, NullEventSink, VecEventSink};
    use crate::types::{port_value, InputValue};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn text_node(id: &str, text: &str) -> GraphNode {
        GraphNode::new(id, "text").with_data(json!({ "text": text }))
    }

    fn edge(source: &str, target: &str) -> GraphEdge {
        GraphEdge::new(source, "default", target, "text")
    }

    fn runner() -> WorkflowRunner {
        WorkflowRunner::new(Arc::new(NodeRegistry::with_builtins()))
    }

    /// Registry with an `append` type that tags its first `text` input with its id
    fn tracing_registry(calls: Arc<Mutex<Vec<String>>>) -> NodeRegistry {
        let mut registry = NodeRegistry::with_builtins();
        registry.register_sync("append", move |node, inputs| {
            calls.lock().unwrap().push(node.id.clone());
            let upstream = inputs
                .get("text")
                .and_then(InputValue::first)
                .and_then(|v| v["value"].as_str())
                .unwrap_or_default()
                .to_string();
            let mut outputs = NodeOutput::new();
            outputs.insert(
                "default".to_string(),
                port_value("text", format!("{upstream}{}", node.id)),
            );
            Ok(outputs)
        });
        registry
    }

    fn chain(ids: &[&str]) -> (Vec<GraphNode>, Vec<GraphEdge>) {
        let nodes = ids.iter().map(|id| GraphNode::new(*id, "append")).collect();
        let edges = ids.windows(2).map(|w| edge(w[0], w[1])).collect();
        (nodes, edges)
    }

    #[tokio::test]
    async fn test_two_text_nodes_succeed() {
        let nodes = vec![text_node("a", "hello"), GraphNode::new("b", "text")];
        let edges = vec![edge("a", "b")];
        let sink = VecEventSink::new();

        let result = runner().run_workflow_dag(&nodes, &edges, &sink).await;

        assert!(result.success);
        assert_eq!(result.completed_count, 2);
        assert!(result.error.is_none());
        assert_eq!(result.node_outputs["b"]["default"]["value"], "hello");

        let last_progress = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                WorkflowEvent::Progress {
                    completed,
                    total,
                    percentage,
                    ..
                } => Some((completed, total, percentage)),
                _ => None,
            })
            .last()
            .unwrap();
        assert_eq!(last_progress, (2, 2, 100.0));
    }

    #[tokio::test]
    async fn test_event_order() {
        let nodes = vec![text_node("a", "x"), GraphNode::new("b", "text")];
        let edges = vec![edge("a", "b")];
        let sink = VecEventSink::new();

        let result = runner().run_workflow_dag(&nodes, &edges, &sink).await;
        let kinds: Vec<String> = sink
            .events()
            .iter()
            .map(|e| {
                let json = serde_json::to_value(e).unwrap();
                let kind = json["type"].as_str().unwrap().to_string();
                match e.node_id() {
                    Some(id) => format!("{kind}:{id}"),
                    None => kind,
                }
            })
            .collect();

        assert_eq!(
            kinds,
            vec![
                "runStarted",
                "nodeStarted:a",
                "nodeCompleted:a",
                "progress",
                "nodeStarted:b",
                "nodeCompleted:b",
                "progress",
                "runCompleted",
            ]
        );
        assert!(sink.events().iter().all(|e| match e {
            WorkflowEvent::RunStarted { execution_id, .. }
            | WorkflowEvent::NodeStarted { execution_id, .. }
            | WorkflowEvent::NodeCompleted { execution_id, .. }
            | WorkflowEvent::NodeFailed { execution_id, .. }
            | WorkflowEvent::Progress { execution_id, .. }
            | WorkflowEvent::RunCompleted { execution_id, .. }
            | WorkflowEvent::RunFailed { execution_id, .. } => *execution_id == result.execution_id,
        }));
    }

    #[tokio::test]
    async fn test_start_callback_failure_is_fail_fast() {
        let nodes = vec![GraphNode::new("fail", "text")];
        let errors = Arc::new(Mutex::new(Vec::new()));
        let seen = errors.clone();
        let sink = CallbackSink::new()
            .on_node_start(|_, _| Err("boom".to_string()))
            .on_node_error(move |id, error| seen.lock().unwrap().push(format!("{id}:{error}")));

        let result = runner().run_workflow_dag(&nodes, &[], &sink).await;

        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("Node fail failed: boom"));
        assert_eq!(result.node_errors["fail"], "boom");
        assert_eq!(result.completed_count, 0);
        assert!(!result.executed("fail"));
        assert_eq!(*errors.lock().unwrap(), vec!["fail:boom"]);
    }

    #[tokio::test]
    async fn test_completion_callback_failure_fails_node() {
        let nodes = vec![text_node("a", "x"), GraphNode::new("b", "text")];
        let sink = CallbackSink::new().on_node_complete(|id, _| {
            if id == "a" {
                Err("display closed".to_string())
            } else {
                Ok(())
            }
        });

        let result = runner()
            .run_workflow_dag(&nodes, &[edge("a", "b")], &sink)
            .await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Node a failed: display closed"));
        assert_eq!(result.node_errors["a"], "display closed");
        assert_eq!(result.completed_count, 0);
        assert!(result.executed("a"));
        assert!(!result.executed("b"));
    }

    #[tokio::test]
    async fn test_progress_callback_failure_fails_node() {
        let nodes = vec![text_node("a", "x"), GraphNode::new("b", "text")];
        let sink = CallbackSink::new().on_progress(|p| {
            if p.completed == 1 {
                Err("progress bar gone".to_string())
            } else {
                Ok(())
            }
        });

        let result = runner()
            .run_workflow_dag(&nodes, &[edge("a", "b")], &sink)
            .await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Node a failed: progress bar gone"));
        assert_eq!(result.node_errors["a"], "progress bar gone");
        assert_eq!(result.completed_count, 0);
        assert!(result.executed("a"));
        assert!(!result.executed("b"));
    }

    /// Registry with a `step` type that logs each dispatch and fails when `data.fail` is set
    fn step_registry(calls: Arc<Mutex<Vec<String>>>) -> NodeRegistry {
        let mut registry = NodeRegistry::new();
        registry.register_sync("step", move |node, _| {
            calls.lock().unwrap().push(node.id.clone());
            if node.data["fail"].as_bool().unwrap_or(false) {
                return Err(EngineError::failed("boom"));
            }
            Ok(NodeOutput::new())
        });
        registry
    }

    fn failing_layer() -> Vec<GraphNode> {
        vec![
            GraphNode::new("bad", "step").with_data(json!({"fail": true})),
            GraphNode::new("x", "step"),
            GraphNode::new("y", "step"),
        ]
    }

    #[tokio::test]
    async fn test_bounded_layer_stops_dispatch_after_failure() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let runner = WorkflowRunner::new(Arc::new(step_registry(calls.clone())))
            .with_config(RunnerConfig::default().with_max_concurrency(1));

        let result = runner
            .run_workflow_dag(&failing_layer(), &[], &NullEventSink)
            .await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Node bad failed: boom"));
        assert_eq!(*calls.lock().unwrap(), vec!["bad"]);
        assert_eq!(result.completed_count, 0);
        assert_eq!(result.node_errors.len(), 1);
        assert!(!result.executed("x"));
        assert!(!result.executed("y"));
    }

    #[tokio::test]
    async fn test_bounded_layer_keeps_in_flight_sibling() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let runner = WorkflowRunner::new(Arc::new(step_registry(calls.clone())))
            .with_config(RunnerConfig::default().with_max_concurrency(2));

        let result = runner
            .run_workflow_dag(&failing_layer(), &[], &NullEventSink)
            .await;

        let mut dispatched = calls.lock().unwrap().clone();
        dispatched.sort();
        assert_eq!(dispatched, vec!["bad", "x"]);
        assert!(!result.success);
        assert!(result.executed("x"));
        assert!(!result.executed("y"));
        assert_eq!(result.completed_count, 1);
    }

    #[tokio::test]
    async fn test_node_error_halts_later_layers_and_keeps_outputs() {
        let mut registry = NodeRegistry::with_builtins();
        registry.register_sync("explode", |_, _| Err(EngineError::failed("model offline")));
        let runner = WorkflowRunner::new(Arc::new(registry));

        // a -> bad -> c, a -> ok (ok shares bad's layer)
        let nodes = vec![
            text_node("a", "x"),
            GraphNode::new("bad", "explode"),
            GraphNode::new("ok", "text"),
            GraphNode::new("c", "text"),
        ];
        let edges = vec![edge("a", "bad"), edge("bad", "c"), edge("a", "ok")];

        let result = runner.run_workflow_dag(&nodes, &edges, &NullEventSink).await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Node bad failed: model offline"));
        assert_eq!(result.node_errors.len(), 1);
        assert!(result.executed("a"));
        assert!(result.executed("ok"));
        assert!(!result.executed("c"));
        assert_eq!(result.completed_count, 2);
        assert_eq!(result.total_count, 4);
    }

    #[tokio::test]
    async fn test_cycle_fails_before_execution() {
        let nodes = vec![
            GraphNode::new("a", "text"),
            GraphNode::new("b", "text"),
            GraphNode::new("c", "text"),
        ];
        let edges = vec![edge("a", "b"), edge("b", "c"), edge("c", "b")];
        let sink = VecEventSink::new();

        let result = runner().run_workflow_dag(&nodes, &edges, &sink).await;

        assert!(!result.success);
        assert_eq!(result.completed_count, 0);
        assert!(result.node_outputs.is_empty());
        assert_eq!(result.error.as_deref(), Some("Cyclic dependency detected"));
        assert!(!sink
            .events()
            .iter()
            .any(|e| matches!(e, WorkflowEvent::NodeStarted { .. })));
    }

    #[tokio::test]
    async fn test_single_node_runs_upstream_closure_only() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let runner = WorkflowRunner::new(Arc::new(tracing_registry(calls.clone())));
        let (nodes, edges) = chain(&["a", "b", "c", "d"]);

        let result = runner
            .run_single_node("c", &nodes, &edges, &NullEventSink)
            .await;

        assert!(result.success);
        assert_eq!(result.completed_count, 3);
        assert_eq!(result.total_count, 3);
        assert_eq!(*calls.lock().unwrap(), vec!["a", "b", "c"]);
        assert!(!result.executed("d"));
        assert_eq!(result.node_outputs["c"]["default"]["value"], "abc");
    }

    #[tokio::test]
    async fn test_single_node_ignores_unrelated_branches() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let runner = WorkflowRunner::new(Arc::new(tracing_registry(calls.clone())));
        let nodes = vec![
            GraphNode::new("x", "append"),
            GraphNode::new("a", "append"),
            GraphNode::new("y", "append"),
            GraphNode::new("target", "append"),
        ];
        let edges = vec![edge("a", "target"), edge("x", "y")];

        let result = runner
            .run_single_node("target", &nodes, &edges, &NullEventSink)
            .await;

        assert!(result.success);
        assert_eq!(*calls.lock().unwrap(), vec!["a", "target"]);
    }

    #[tokio::test]
    async fn test_single_node_not_found() {
        let sink = VecEventSink::new();
        let result = runner()
            .run_single_node("ghost", &[GraphNode::new("a", "text")], &[], &sink)
            .await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Node ghost not found"));
        assert_eq!(result.completed_count, 0);
        assert!(matches!(
            sink.events().as_slice(),
            [WorkflowEvent::RunFailed { .. }]
        ));
    }

    #[tokio::test]
    async fn test_fan_in_order_independent_of_completion() {
        let mut registry = NodeRegistry::with_builtins();
        registry.register_callback("slow-text", |node, _| async move {
            let delay = node.data["delay"].as_u64().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            let mut outputs = NodeOutput::new();
            outputs.insert("default".to_string(), port_value("text", node.id.clone()));
            Ok(outputs)
        });
        registry.register_sync("collect", |_, inputs| {
            let mut outputs = NodeOutput::new();
            let order: Vec<serde_json::Value> = inputs["items"]
                .iter()
                .map(|v| v["sourceNode"].clone())
                .collect();
            outputs.insert("default".to_string(), json!(order));
            Ok(outputs)
        });
        let runner = WorkflowRunner::new(Arc::new(registry));

        let nodes = vec![
            GraphNode::new("slow", "slow-text").with_data(json!({"delay": 30})),
            GraphNode::new("fast", "slow-text").with_data(json!({"delay": 0})),
            GraphNode::new("sink", "collect"),
        ];
        let edges = vec![
            GraphEdge::new("slow", "default", "sink", "items"),
            GraphEdge::new("fast", "default", "sink", "items"),
        ];

        let result = runner.run_workflow_dag(&nodes, &edges, &NullEventSink).await;
        assert!(result.success);
        assert_eq!(result.node_outputs["sink"]["default"], json!(["slow", "fast"]));
    }

    #[tokio::test]
    async fn test_layer_runs_concurrently_and_respects_bound() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let build = |limit: Option<usize>| {
            let active = active.clone();
            let peak = peak.clone();
            let mut registry = NodeRegistry::new();
            registry.register_callback("wait", move |_, _| {
                let active = active.clone();
                let peak = peak.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(NodeOutput::new())
                }
            });
            let mut config = RunnerConfig::default();
            if let Some(limit) = limit {
                config = config.with_max_concurrency(limit);
            }
            WorkflowRunner::new(Arc::new(registry)).with_config(config)
        };

        let nodes: Vec<GraphNode> = (0..4)
            .map(|i| GraphNode::new(format!("n{i}"), "wait"))
            .collect();

        let result = build(None).run_workflow_dag(&nodes, &[], &NullEventSink).await;
        assert!(result.success);
        assert_eq!(peak.load(Ordering::SeqCst), 4);

        peak.store(0, Ordering::SeqCst);
        let result = build(Some(2))
            .run_workflow_dag(&nodes, &[], &NullEventSink)
            .await;
        assert!(result.success);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panicking_node_becomes_node_error() {
        let mut registry = NodeRegistry::new();
        registry.register_sync("panics", |_, _| panic!("bad state"));
        let runner = WorkflowRunner::new(Arc::new(registry));

        let result = runner
            .run_workflow_dag(&[GraphNode::new("p", "panics")], &[], &NullEventSink)
            .await;

        assert!(!result.success);
        assert_eq!(result.node_errors["p"], "node panicked: bad state");
    }

    #[tokio::test]
    async fn test_unknown_type_passes_through() {
        let nodes = vec![text_node("a", "v"), GraphNode::new("b", "image-gen")];
        let result = runner()
            .run_workflow_dag(&nodes, &[edge("a", "b")], &NullEventSink)
            .await;

        assert!(result.success);
        let marker = &result.node_outputs["b"]["default"];
        assert_eq!(marker["type"], "passthrough");
        assert_eq!(marker["value"]["text"]["value"], "v");
    }

    #[tokio::test]
    async fn test_channel_sink_stream() {
        let (sink, mut rx) = ChannelEventSink::channel();
        let nodes = vec![text_node("a", "x")];

        let result = runner().run_workflow_dag(&nodes, &[], &sink).await;
        assert!(result.success);
        drop(sink);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(WorkflowEvent::RunStarted { total_nodes: 1, .. })));
        assert!(matches!(events.last(), Some(WorkflowEvent::RunCompleted { completed: 1, .. })));
    }

    #[tokio::test]
    async fn test_empty_workflow_succeeds() {
        let result = runner().run_workflow_dag(&[], &[], &NullEventSink).await;
        assert!(result.success);
        assert_eq!(result.completed_count, 0);
    }

    #[tokio::test]
    async fn test_run_document() {
        let document = WorkflowDocument::from_json_str(
            r#"{"id": "wf", "name": "Doc", "data": {
                "nodes": [{"id": "a", "type": "text", "data": {"text": "doc"}}, {"id": "b", "type": "text"}],
                "edges": [{"source": "a", "target": "b", "sourceHandle": "default", "targetHandle": "text"}]
            }}"#,
        )
        .unwrap();

        let result = runner().run_document(&document, &NullEventSink).await;
        assert!(result.success);
        assert_eq!(result.node_outputs["b"]["default"]["value"], "doc");
    }

    #[tokio::test]
    async fn test_execution_ids_are_fresh() {
        let runner = runner().with_config(RunnerConfig::default().with_execution_id_prefix("test"));
        let first = runner.run_workflow_dag(&[], &[], &NullEventSink).await;
        let second = runner.run_workflow_dag(&[], &[], &NullEventSink).await;
        assert!(first.execution_id.starts_with("test-"));
        assert_ne!(first.execution_id, second.execution_id);
    }
}
