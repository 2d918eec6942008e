//! Nodeflow Engine - layered DAG execution for node-based workflows
//!
//! This crate takes the nodes and edges drawn in a workflow editor and runs
//! them in dependency order. It supports:
//!
//! - Kahn-style layering: every node runs after all of its producers
//! - Concurrent execution of the nodes within one layer
//! - Fan-in: a port fed by several edges receives every value, in edge order
//! - Single-node runs that execute only the target and its upstream closure
//! - Open dispatch: node types are looked up in a [`NodeRegistry`]
//!
//! # Architecture
//!
//! - `graph`: dependency tables built from the edge list
//! - `layering`: topological layers, cycle detection
//! - `resolver`: gathers a node's inputs from upstream outputs
//! - `registry`: node type to executor dispatch, with a pass-through fallback
//! - `runner`: the orchestrator that drives a run and reports [`WorkflowEvent`]s
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use nodeflow_engine::{NodeRegistry, VecEventSink, WorkflowDocument, WorkflowRunner};
//!
//! let document = WorkflowDocument::load("workflow.json")?;
//! let runner = WorkflowRunner::new(Arc::new(NodeRegistry::with_builtins()));
//! let sink = VecEventSink::new();
//! let result = runner.run_document(&document, &sink).await;
//! assert!(result.success);
//! ```

pub mod builtins;
pub mod config;
pub mod error;
pub mod events;
pub mod graph;
pub mod layering;
pub mod registry;
pub mod resolver;
pub mod runner;
pub mod types;
pub mod validation;

// Re-export key types
pub use builtins::{PassthroughExecutor, TextExecutor};
pub use config::RunnerConfig;
pub use error::{EngineError, Result};
pub use events::{
    CallbackSink, ChannelEventSink, EventError, EventSink, NullEventSink, Progress, VecEventSink,
    WorkflowEvent,
};
pub use graph::{build_dependency_graph, upstream_closure, AdjacentEdge, DependencyGraph};
pub use layering::{compute_execution_layers, ExecutionLayers};
pub use registry::{
    BuiltinNode, CallbackNodeExecutor, NodeExecutor, NodeRegistry, SyncCallbackNodeExecutor,
};
pub use resolver::resolve_node_inputs;
pub use runner::{RunResult, WorkflowRunner};
pub use types::{
    payload, port_value, GraphEdge, GraphNode, InputValue, NodeId, NodeInputs, NodeOutput,
    NodeOutputs, PortId, WorkflowDocument, DEFAULT_PORT,
};
pub use validation::{validate_workflow, ValidationError};
