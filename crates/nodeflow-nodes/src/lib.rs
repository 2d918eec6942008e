//! Workflow Nodes
//!
//! Node type implementations for the nodeflow engine. Each type registers
//! itself with `inventory`, so `NodeRegistry::with_builtins()` picks it up
//! as soon as this crate is linked.
//!
//! # Categories
//!
//! - **Control**: Nodes that combine or route values (merge)
//! - **Output**: Nodes that present results (text output)
//! - **Processing**: Nodes that transform data (JSON extraction)

use nodeflow_engine::{payload, GraphNode, NodeInputs};
use serde::de::DeserializeOwned;

pub mod control;
pub mod output;
pub mod processing;

// Re-export all executors for convenience
pub use control::*;
pub use output::*;
pub use processing::*;

/// Parse a node's `data` as its configuration; missing data means defaults
pub(crate) fn node_config<T>(node: &GraphNode) -> nodeflow_engine::Result<T>
where
    T: DeserializeOwned + Default,
{
    if node.data.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(node.data.clone())?)
}

/// Text carried by every value delivered to a port, in edge order
pub(crate) fn input_texts(inputs: &NodeInputs, port: &str) -> Vec<String> {
    inputs
        .get(port)
        .into_iter()
        .flat_map(|value| value.iter())
        .map(|v| match payload(v) {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect()
}
