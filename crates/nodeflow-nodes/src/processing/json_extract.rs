//! JSON Extract node
//!
//! Extracts values from JSON data using path expressions.
//! Supports simple dot notation and array indexing.

use std::sync::Arc;

use async_trait::async_trait;
use nodeflow_engine::{
    payload, port_value, BuiltinNode, EngineError, GraphNode, InputValue, NodeExecutor,
    NodeInputs, NodeOutput, Result, DEFAULT_PORT,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::node_config;

/// Configuration for the JSON extract node, read from node data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JsonExtractConfig {
    /// Path expression (e.g., "data.items[0].name" or "[0].arguments.content")
    pub path: String,
    /// Value emitted when the path doesn't exist
    pub default_value: Option<Value>,
}

/// JSON Extract node
///
/// # Path Syntax Examples
/// - `"name"` - Get the "name" field
/// - `"data.items"` - Get nested field
/// - `"[0]"` - Get first array element
/// - `"items[0].name"` - Combined access
///
/// # Inputs
/// - `json` (required) - JSON data to extract from
///
/// # Outputs
/// - `value` - Extracted value (also on `default`)
/// - `found` - Whether the path was found
pub struct JsonExtractExecutor;

/// One step of a parsed path
#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Field(&'a str),
    Index(usize),
}

impl JsonExtractExecutor {
    /// Port ID for json input
    pub const PORT_JSON: &'static str = "json";
    /// Port ID for value output
    pub const PORT_VALUE: &'static str = "value";
    /// Port ID for found output
    pub const PORT_FOUND: &'static str = "found";

    /// Split a path into field and index segments; `None` if malformed
    fn parse_path(path: &str) -> Option<Vec<Segment<'_>>> {
        let mut segments = Vec::new();
        for part in path.split('.').filter(|p| !p.is_empty()) {
            let (field, mut rest) = match part.find('[') {
                Some(pos) => part.split_at(pos),
                None => (part, ""),
            };
            if !field.is_empty() {
                segments.push(Segment::Field(field));
            }
            while let Some(stripped) = rest.strip_prefix('[') {
                let end = stripped.find(']')?;
                segments.push(Segment::Index(stripped[..end].parse().ok()?));
                rest = &stripped[end + 1..];
            }
            if !rest.is_empty() {
                return None;
            }
        }
        Some(segments)
    }

    /// Extract a value from JSON using a path expression
    pub fn extract_path(json: &Value, path: &str) -> Option<Value> {
        let mut current = json;
        for segment in Self::parse_path(path)? {
            current = match segment {
                Segment::Field(field) => current.get(field)?,
                Segment::Index(index) => current.get(index)?,
            };
        }
        Some(current.clone())
    }
}

#[async_trait]
impl NodeExecutor for JsonExtractExecutor {
    async fn execute(&self, node: &GraphNode, inputs: NodeInputs) -> Result<NodeOutput> {
        let json = inputs
            .get(Self::PORT_JSON)
            .and_then(InputValue::first)
            .map(payload)
            .ok_or_else(|| EngineError::invalid_input(Self::PORT_JSON, "missing required input"))?;
        let config: JsonExtractConfig = node_config(node)?;

        log::debug!(
            "JSON extract node {}: extracting path '{}'",
            node.id,
            config.path
        );

        let (value, found) = match Self::extract_path(json, &config.path) {
            Some(v) => (v, true),
            None => (config.default_value.unwrap_or(Value::Null), false),
        };

        log::debug!("JSON extract node {}: found={}", node.id, found);

        let value = port_value("json", value);
        let mut outputs = NodeOutput::new();
        outputs.insert(DEFAULT_PORT.to_string(), value.clone());
        outputs.insert(Self::PORT_VALUE.to_string(), value);
        outputs.insert(Self::PORT_FOUND.to_string(), port_value("boolean", found));
        Ok(outputs)
    }
}

fn json_extract_executor() -> Arc<dyn NodeExecutor> {
    Arc::new(JsonExtractExecutor)
}

inventory::submit!(BuiltinNode {
    node_type: "json-extract",
    executor: json_extract_executor,
});
