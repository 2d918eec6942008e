//! Event types for streaming workflow progress
//!
//! The runner reports every state change as a [`WorkflowEvent`] pushed into
//! an [`EventSink`]. Sinks decide the transport: collect into a vector, forward
//! over a tokio channel, or call per-event closures. A sink may reject a
//! node-level event, which fails that node exactly like an executor error.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::{NodeId, NodeOutput};

/// Trait for receiving workflow events
///
/// This abstracts over the transport mechanism (channel, callbacks, etc.)
/// allowing the runner to be used in different contexts.
pub trait EventSink: Send + Sync {
    /// Deliver an event
    ///
    /// Returns an error if the event was rejected (e.g., channel closed or a
    /// callback failed).
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError>;
}

/// Error when delivering an event fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for EventError {}

impl EventError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn channel_closed() -> Self {
        Self::new("Channel closed")
    }
}

/// Completion counters reported after each finished node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub percentage: f64,
}

impl Progress {
    pub fn new(completed: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            100.0
        } else {
            completed as f64 / total as f64 * 100.0
        };
        Self {
            completed,
            total,
            percentage,
        }
    }
}

/// Events emitted during a workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkflowEvent {
    /// Layers were computed and execution is about to begin
    #[serde(rename_all = "camelCase")]
    RunStarted {
        execution_id: String,
        total_nodes: usize,
        layer_count: usize,
    },

    /// A node is about to execute
    #[serde(rename_all = "camelCase")]
    NodeStarted {
        execution_id: String,
        node_id: NodeId,
        node_type: String,
    },

    /// A node finished and its outputs were recorded
    #[serde(rename_all = "camelCase")]
    NodeCompleted {
        execution_id: String,
        node_id: NodeId,
        outputs: NodeOutput,
    },

    /// A node failed
    #[serde(rename_all = "camelCase")]
    NodeFailed {
        execution_id: String,
        node_id: NodeId,
        error: String,
    },

    /// Completion counters after a node finished
    #[serde(rename_all = "camelCase")]
    Progress {
        execution_id: String,
        completed: usize,
        total: usize,
        percentage: f64,
    },

    /// Every node completed
    #[serde(rename_all = "camelCase")]
    RunCompleted {
        execution_id: String,
        completed: usize,
    },

    /// The run stopped on a construction or node error
    #[serde(rename_all = "camelCase")]
    RunFailed { execution_id: String, error: String },
}

impl WorkflowEvent {
    /// Create a progress event
    pub fn progress(execution_id: &str, progress: Progress) -> Self {
        Self::Progress {
            execution_id: execution_id.to_string(),
            completed: progress.completed,
            total: progress.total,
            percentage: progress.percentage,
        }
    }

    /// The node this event is about, if any
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::NodeStarted { node_id, .. }
            | Self::NodeCompleted { node_id, .. }
            | Self::NodeFailed { node_id, .. } => Some(node_id),
            _ => None,
        }
    }
}

/// A no-op event sink that discards all events
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: WorkflowEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted in order.
#[derive(Default)]
pub struct VecEventSink {
    events: Mutex<Vec<WorkflowEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}

/// Forwards events into a tokio unbounded channel
///
/// The receiving half can be consumed as a stream while the run is in
/// progress. Dropping the receiver makes further sends fail.
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<WorkflowEvent>,
}

impl ChannelEventSink {
    /// Create a sink and the receiver for its events
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WorkflowEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError> {
        self.tx.send(event).map_err(|_| EventError::channel_closed())
    }
}

type StartFn = Box<dyn Fn(&str, &str) -> Result<(), String> + Send + Sync>;
type CompleteFn = Box<dyn Fn(&str, &NodeOutput) -> Result<(), String> + Send + Sync>;
type ErrorFn = Box<dyn Fn(&str, &str) + Send + Sync>;
type ProgressFn = Box<dyn Fn(Progress) -> Result<(), String> + Send + Sync>;

/// Calls optional closures for node start, completion, error and progress
///
/// Returning `Err` from the start, completion or progress closure fails the
/// node being reported.
///
/// ```ignore
/// let sink = CallbackSink::new()
///     .on_node_start(|node_id, _node_type| {
///         println!("running {node_id}");
///         Ok(())
///     })
///     .on_progress(|p| {
///         println!("{:.0}%", p.percentage);
///         Ok(())
///     });
/// ```
#[derive(Default)]
pub struct CallbackSink {
    on_node_start: Option<StartFn>,
    on_node_complete: Option<CompleteFn>,
    on_node_error: Option<ErrorFn>,
    on_progress: Option<ProgressFn>,
}

impl CallbackSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with `(node_id, node_type)` before a node executes
    pub fn on_node_start(
        mut self,
        f: impl Fn(&str, &str) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.on_node_start = Some(Box::new(f));
        self
    }

    /// Called with `(node_id, outputs)` after a node's outputs are recorded
    pub fn on_node_complete(
        mut self,
        f: impl Fn(&str, &NodeOutput) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.on_node_complete = Some(Box::new(f));
        self
    }

    /// Called with `(node_id, error)` when a node fails
    pub fn on_node_error(mut self, f: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.on_node_error = Some(Box::new(f));
        self
    }

    /// Called after every completed node
    pub fn on_progress(
        mut self,
        f: impl Fn(Progress) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }
}

impl EventSink for CallbackSink {
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError> {
        let result = match &event {
            WorkflowEvent::NodeStarted {
                node_id, node_type, ..
            } => self
                .on_node_start
                .as_ref()
                .map_or(Ok(()), |f| f(node_id.as_str(), node_type.as_str())),
            WorkflowEvent::NodeCompleted {
                node_id, outputs, ..
            } => self
                .on_node_complete
                .as_ref()
                .map_or(Ok(()), |f| f(node_id.as_str(), outputs)),
            WorkflowEvent::NodeFailed { node_id, error, .. } => {
                if let Some(f) = &self.on_node_error {
                    f(node_id.as_str(), error.as_str());
                }
                Ok(())
            }
            WorkflowEvent::Progress {
                completed, total, ..
            } => self
                .on_progress
                .as_ref()
                .map_or(Ok(()), |f| f(Progress::new(*completed, *total))),
            _ => Ok(()),
        };
        result.map_err(EventError::new)
    }
}
