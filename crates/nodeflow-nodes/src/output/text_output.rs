//! Text Output node
//!
//! Marks a text result for display and passes it through for chaining.

use std::sync::Arc;

use async_trait::async_trait;
use nodeflow_engine::{
    port_value, BuiltinNode, EngineError, GraphNode, NodeExecutor, NodeInputs, NodeOutput,
    Result, DEFAULT_PORT,
};

use crate::input_texts;

/// Text Output node
///
/// # Inputs
/// - `text` (required) - The text to display
///
/// # Outputs
/// - `text` - The same text (for chaining, also on `default`)
pub struct TextOutputExecutor;

impl TextOutputExecutor {
    /// Port ID for text input/output
    pub const PORT_TEXT: &'static str = "text";
}

#[async_trait]
impl NodeExecutor for TextOutputExecutor {
    async fn execute(&self, node: &GraphNode, inputs: NodeInputs) -> Result<NodeOutput> {
        let text = input_texts(&inputs, Self::PORT_TEXT)
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::invalid_input(Self::PORT_TEXT, "missing required input"))?;

        log::debug!(
            "Text output node {}: outputting {} chars",
            node.id,
            text.len()
        );

        let text = port_value("text", text);
        let mut outputs = NodeOutput::new();
        outputs.insert(DEFAULT_PORT.to_string(), text.clone());
        outputs.insert(Self::PORT_TEXT.to_string(), text);
        Ok(outputs)
    }
}

fn text_output_executor() -> Arc<dyn NodeExecutor> {
    Arc::new(TextOutputExecutor)
}

inventory::submit!(BuiltinNode {
    node_type: "text-output",
    executor: text_output_executor,
});
