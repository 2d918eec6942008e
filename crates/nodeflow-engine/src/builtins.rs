//! Built-in node handlers
//!
//! Only the text pass-through types live in the engine; everything richer is
//! registered by the host. Unknown types go to [`PassthroughExecutor`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::registry::{BuiltinNode, NodeExecutor};
use crate::types::{payload, port_value, GraphNode, NodeInputs, NodeOutput, DEFAULT_PORT};

/// Input ports checked, in order, when a text node has no `data.text`
const TEXT_INPUT_PORTS: [&str; 2] = ["text", "input"];

/// Emits the node's raw text on the `default` port
///
/// Text comes from `data.text`; when absent, the first value wired into the
/// `text` (or `input`) port is passed through instead.
pub struct TextExecutor;

#[async_trait]
impl NodeExecutor for TextExecutor {
    async fn execute(&self, node: &GraphNode, inputs: NodeInputs) -> Result<NodeOutput> {
        let text = node
            .data
            .get("text")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .or_else(|| {
                TEXT_INPUT_PORTS
                    .iter()
                    .filter_map(|port| inputs.get(*port).and_then(|v| v.first()))
                    .map(|v| match payload(v) {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .next()
            })
            .unwrap_or_default();

        log::debug!("Text node '{}': passing through {} chars", node.id, text.len());

        let mut outputs = NodeOutput::new();
        outputs.insert(DEFAULT_PORT.to_string(), port_value("text", text));
        Ok(outputs)
    }
}

/// Fallback for node types without an executor
///
/// Performs no transformation: the single `default` output is marked
/// `passthrough` and carries the resolved inputs as-is.
pub struct PassthroughExecutor;

#[async_trait]
impl NodeExecutor for PassthroughExecutor {
    async fn execute(&self, node: &GraphNode, inputs: NodeInputs) -> Result<NodeOutput> {
        log::debug!(
            "No executor for node type '{}' (node '{}'); passing inputs through",
            node.node_type,
            node.id
        );
        let value = serde_json::to_value(inputs)?;
        let mut marker = port_value("passthrough", value);
        marker["transformed"] = serde_json::Value::Bool(false);

        let mut outputs = NodeOutput::new();
        outputs.insert(DEFAULT_PORT.to_string(), marker);
        Ok(outputs)
    }
}

fn text_executor() -> Arc<dyn NodeExecutor> {
    Arc::new(TextExecutor)
}

inventory::submit!(BuiltinNode {
    node_type: "text",
    executor: text_executor,
});
inventory::submit!(BuiltinNode {
    node_type: "text-input",
    executor: text_executor,
});
inventory::submit!(BuiltinNode {
    node_type: "markdown",
    executor: text_executor,
});
inventory::submit!(BuiltinNode {
    node_type: "prompt",
    executor: text_executor,
});
