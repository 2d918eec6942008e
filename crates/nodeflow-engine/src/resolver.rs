//! Input resolution
//!
//! Collects the values flowing into a node from the outputs of nodes that
//! have already completed. Missing producers or ports are not errors; the
//! edge simply contributes nothing, which lets optional ports stay unwired.

use crate::types::{
    GraphEdge, GraphNode, InputValue, NodeInputs, NodeOutputs, DEFAULT_PORT,
};

/// Resolve a node's inputs from upstream outputs
///
/// Edges are visited in declaration order. The first edge into a port sets
/// a single value; later edges into the same port turn it into a list.
/// Each delivered value carries `sourceNode` and `sourceHandle` fields.
pub fn resolve_node_inputs(
    node: &GraphNode,
    edges: &[GraphEdge],
    outputs: &NodeOutputs,
) -> NodeInputs {
    let mut inputs = NodeInputs::new();

    for edge in edges.iter().filter(|e| e.target == node.id) {
        let Some(source_outputs) = outputs.get(&edge.source) else {
            continue;
        };
        let Some(value) = source_outputs
            .get(&edge.source_handle)
            .or_else(|| source_outputs.get(DEFAULT_PORT))
        else {
            continue;
        };

        let value = annotate(value, &edge.source, &edge.source_handle);
        match inputs.get_mut(&edge.target_handle) {
            Some(existing) => existing.push(value),
            None => {
                inputs.insert(edge.target_handle.clone(), InputValue::Single(value));
            }
        }
    }

    inputs
}

/// Merge provenance fields into a value; non-objects are wrapped as `{ value }`
fn annotate(value: &serde_json::Value, source_node: &str, source_handle: &str) -> serde_json::Value {
    let mut fields = match value {
        serde_json::Value::Object(map) => map.clone(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("value".to_string(), other.clone());
            map
        }
    };
    fields.insert("sourceNode".to_string(), source_node.into());
    fields.insert("sourceHandle".to_string(), source_handle.into());
    serde_json::Value::Object(fields)
}
