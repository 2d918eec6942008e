//! Merge node
//!
//! Combines multiple string inputs into a single output.
//! This node is useful for aggregating results from parallel branches
//! or combining context from multiple sources.

use std::sync::Arc;

use async_trait::async_trait;
use nodeflow_engine::{
    port_value, BuiltinNode, GraphNode, NodeExecutor, NodeInputs, NodeOutput, Result,
    DEFAULT_PORT,
};
use serde::{Deserialize, Serialize};

use crate::{input_texts, node_config};

/// Configuration for the merge node, read from node data
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MergeConfig {
    /// Separator to use when joining inputs
    pub separator: String,
    /// Whether to filter out empty inputs
    pub filter_empty: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            separator: "\n".to_string(),
            filter_empty: true,
        }
    }
}

/// Merge node
///
/// Joins every value wired into `inputs`, in edge order, using the
/// configured separator (default: newline).
///
/// # Inputs
/// - `inputs` (multiple) - String inputs to merge
///
/// # Outputs
/// - `merged` - Combined string output (also on `default`)
/// - `count` - Number of inputs merged
pub struct MergeExecutor;

impl MergeExecutor {
    /// Port ID for inputs (accepts multiple connections)
    pub const PORT_INPUTS: &'static str = "inputs";
    /// Port ID for merged output
    pub const PORT_MERGED: &'static str = "merged";
    /// Port ID for count output
    pub const PORT_COUNT: &'static str = "count";

    fn merge(config: &MergeConfig, inputs: &[String]) -> (String, usize) {
        let filtered: Vec<&str> = inputs
            .iter()
            .map(String::as_str)
            .filter(|s| !config.filter_empty || !s.trim().is_empty())
            .collect();
        (filtered.join(&config.separator), filtered.len())
    }
}

#[async_trait]
impl NodeExecutor for MergeExecutor {
    async fn execute(&self, node: &GraphNode, inputs: NodeInputs) -> Result<NodeOutput> {
        let config: MergeConfig = node_config(node)?;
        let texts = input_texts(&inputs, Self::PORT_INPUTS);

        log::debug!("Merge node {}: merging {} inputs", node.id, texts.len());

        let (merged, count) = Self::merge(&config, &texts);

        log::debug!(
            "Merge node {}: merged {} inputs into {} chars",
            node.id,
            count,
            merged.len()
        );

        let merged = port_value("text", merged);
        let mut outputs = NodeOutput::new();
        outputs.insert(DEFAULT_PORT.to_string(), merged.clone());
        outputs.insert(Self::PORT_MERGED.to_string(), merged);
        outputs.insert(Self::PORT_COUNT.to_string(), port_value("number", count));
        Ok(outputs)
    }
}

fn merge_executor() -> Arc<dyn NodeExecutor> {
    Arc::new(MergeExecutor)
}

inventory::submit!(BuiltinNode {
    node_type: "merge",
    executor: merge_executor,
});
