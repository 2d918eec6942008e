//! Node type registry for dynamic node dispatch
//!
//! Maps node type strings to executors. The scheduler never matches on
//! node types itself; hosts register new types here without touching the
//! graph builder, layering or input resolution.
//!
//! # Usage
//!
//! ```ignore
//! use nodeflow_engine::{NodeRegistry, port_value};
//!
//! let mut registry = NodeRegistry::with_builtins();
//! registry.register_sync("uppercase", |node, inputs| {
//!     let text = inputs.get("text").and_then(|v| v.first()).cloned();
//!     // ...
//!     Ok(outputs)
//! });
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::builtins::PassthroughExecutor;
use crate::error::Result;
use crate::types::{GraphNode, NodeInputs, NodeOutput};

/// Per-node-type executor
///
/// Receives the node (its `data` is the configuration) and the inputs
/// resolved from upstream outputs, and returns a value per output port.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn execute(&self, node: &GraphNode, inputs: NodeInputs) -> Result<NodeOutput>;
}

/// Link-time registration of a built-in node type
///
/// Collected by [`NodeRegistry::with_builtins`]:
///
/// ```ignore
/// inventory::submit!(nodeflow_engine::BuiltinNode {
///     node_type: "my-node",
///     executor: || std::sync::Arc::new(MyExecutor),
/// });
/// ```
pub struct BuiltinNode {
    /// The node type string this executor serves
    pub node_type: &'static str,
    /// Factory function that creates the executor instance
    pub executor: fn() -> Arc<dyn NodeExecutor>,
}

inventory::collect!(BuiltinNode);

type BoxedFuture = Pin<Box<dyn Future<Output = Result<NodeOutput>> + Send>>;

/// Async callback-based NodeExecutor
///
/// The callback receives owned copies of the node and its inputs so the
/// returned future can be `'static`.
pub struct CallbackNodeExecutor {
    callback: Box<dyn Fn(GraphNode, NodeInputs) -> BoxedFuture + Send + Sync>,
}

#[async_trait]
impl NodeExecutor for CallbackNodeExecutor {
    async fn execute(&self, node: &GraphNode, inputs: NodeInputs) -> Result<NodeOutput> {
        (self.callback)(node.clone(), inputs).await
    }
}

/// Synchronous callback-based NodeExecutor
pub struct SyncCallbackNodeExecutor {
    callback: Box<dyn Fn(&GraphNode, NodeInputs) -> Result<NodeOutput> + Send + Sync>,
}

impl SyncCallbackNodeExecutor {
    pub fn new(
        callback: impl Fn(&GraphNode, NodeInputs) -> Result<NodeOutput> + Send + Sync + 'static,
    ) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }
}

#[async_trait]
impl NodeExecutor for SyncCallbackNodeExecutor {
    async fn execute(&self, node: &GraphNode, inputs: NodeInputs) -> Result<NodeOutput> {
        (self.callback)(node, inputs)
    }
}

/// Registry of node types and their executors
///
/// Types without a registered executor are handled by the fallback, a
/// pass-through by default.
///
/// # Composability
///
/// Registries can be composed by merging:
/// ```ignore
/// let mut registry = NodeRegistry::with_builtins();
/// registry.merge(plugin_registry); // plugin types override built-ins
/// ```
pub struct NodeRegistry {
    executors: HashMap<String, Arc<dyn NodeExecutor>>,
    fallback: Arc<dyn NodeExecutor>,
}

impl NodeRegistry {
    /// Create a registry with no node types and the pass-through fallback
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
            fallback: Arc::new(PassthroughExecutor),
        }
    }

    /// Create a registry holding every link-time registered [`BuiltinNode`]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for builtin in inventory::iter::<BuiltinNode> {
            registry.register(builtin.node_type, (builtin.executor)());
        }
        log::debug!(
            "Node registry initialized with {} built-in types",
            registry.executors.len()
        );
        registry
    }

    /// Replace the executor used for unregistered node types
    pub fn with_fallback(mut self, fallback: Arc<dyn NodeExecutor>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Register an executor for a node type, replacing any previous one
    pub fn register(&mut self, node_type: impl Into<String>, executor: Arc<dyn NodeExecutor>) {
        self.executors.insert(node_type.into(), executor);
    }

    /// Register a node type backed by an async callback
    pub fn register_callback<F, Fut>(&mut self, node_type: impl Into<String>, callback: F)
    where
        F: Fn(GraphNode, NodeInputs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<NodeOutput>> + Send + 'static,
    {
        let executor = CallbackNodeExecutor {
            callback: Box::new(move |node, inputs| Box::pin(callback(node, inputs))),
        };
        self.register(node_type, Arc::new(executor));
    }

    /// Register a node type backed by a synchronous callback
    pub fn register_sync(
        &mut self,
        node_type: impl Into<String>,
        callback: impl Fn(&GraphNode, NodeInputs) -> Result<NodeOutput> + Send + Sync + 'static,
    ) {
        self.register(node_type, Arc::new(SyncCallbackNodeExecutor::new(callback)));
    }

    /// Get the executor registered for a node type
    pub fn get_executor(&self, node_type: &str) -> Option<Arc<dyn NodeExecutor>> {
        self.executors.get(node_type).cloned()
    }

    /// Get the executor that will handle a node type (registered or fallback)
    pub fn executor_for(&self, node_type: &str) -> Arc<dyn NodeExecutor> {
        self.get_executor(node_type)
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Check if a node type is registered
    pub fn has_node_type(&self, node_type: &str) -> bool {
        self.executors.contains_key(node_type)
    }

    /// List all registered node type strings, sorted
    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.executors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` override entries in `self` on conflict. The
    /// fallback of `self` is kept.
    pub fn merge(&mut self, other: NodeRegistry) {
        self.executors.extend(other.executors);
    }

    /// Run a node through the executor for its type
    ///
    /// Errors are returned unchanged; the caller decides how to record them.
    pub async fn execute(&self, node: &GraphNode, inputs: NodeInputs) -> Result<NodeOutput> {
        let executor = self.executor_for(&node.node_type);
        log::debug!(
            "Dispatching node '{}' (type '{}', {} input ports)",
            node.id,
            node.node_type,
            inputs.len()
        );
        executor.execute(node, inputs).await
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
