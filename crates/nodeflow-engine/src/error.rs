//! Error types for the DAG engine

use thiserror::Error;

use crate::types::NodeId;

/// Result type alias using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while building or running a workflow
#[derive(Debug, Error)]
pub enum EngineError {
    /// The graph contains a cycle; the listed nodes could not be placed in a layer
    #[error("Cyclic dependency detected")]
    CyclicDependency { unplaced: Vec<NodeId> },

    /// A requested node id is not part of the workflow
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    /// A node's computation failed
    #[error("{message}")]
    NodeExecution { node_id: NodeId, message: String },

    /// A node received input it cannot work with
    #[error("Invalid input for '{port}': {reason}")]
    InvalidInput { port: String, reason: String },

    /// An event sink rejected a notification
    #[error("{0}")]
    Event(#[from] crate::events::EventError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Create a node execution error without a known node id.
    ///
    /// The orchestrator fills in the id when it records the failure.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::NodeExecution {
            node_id: NodeId::new(),
            message: msg.into(),
        }
    }

    /// Create a node execution error for a specific node
    pub fn execution(node_id: impl Into<NodeId>, msg: impl Into<String>) -> Self {
        Self::NodeExecution {
            node_id: node_id.into(),
            message: msg.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(port: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            port: port.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error was raised before any node could run
    pub fn is_construction_error(&self) -> bool {
        matches!(self, Self::CyclicDependency { .. } | Self::NodeNotFound(_))
    }
}
