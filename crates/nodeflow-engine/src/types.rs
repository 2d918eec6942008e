//! Core types for workflow graphs
//!
//! These types mirror the editor's wire format: nodes carry an id, a type
//! tag and opaque configuration data; edges connect a named output port on
//! one node to a named input port on another.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;

/// Unique identifier for a node
pub type NodeId = String;

/// Identifier of a port (a node's named input or output)
pub type PortId = String;

/// Output port name used when a producer has no port matching the edge
pub const DEFAULT_PORT: &str = "default";

/// Outputs of a single node, keyed by output port
pub type NodeOutput = HashMap<PortId, serde_json::Value>;

/// Outputs of every completed node in a run
pub type NodeOutputs = HashMap<NodeId, NodeOutput>;

/// Resolved inputs of a node, keyed by input port
pub type NodeInputs = HashMap<PortId, InputValue>;

/// A node instance in a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Unique identifier for this node instance
    pub id: NodeId,
    /// Node type, selects the executor
    #[serde(rename = "type")]
    pub node_type: String,
    /// Configuration passed unmodified to the executor
    #[serde(default)]
    pub data: serde_json::Value,
}

impl GraphNode {
    /// Create a node with no configuration
    pub fn new(id: impl Into<NodeId>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            data: serde_json::Value::Null,
        }
    }

    /// Attach configuration data
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// An edge connecting two ports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    /// Editor-assigned identifier, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Source node ID
    pub source: NodeId,
    /// Target node ID
    pub target: NodeId,
    /// Source port ID
    #[serde(default, deserialize_with = "null_as_empty")]
    pub source_handle: PortId,
    /// Target port ID
    #[serde(default, deserialize_with = "null_as_empty")]
    pub target_handle: PortId,
}

impl GraphEdge {
    /// Create an edge from `source.source_handle` to `target.target_handle`
    pub fn new(
        source: impl Into<NodeId>,
        source_handle: impl Into<PortId>,
        target: impl Into<NodeId>,
        target_handle: impl Into<PortId>,
    ) -> Self {
        Self {
            id: None,
            source: source.into(),
            target: target.into(),
            source_handle: source_handle.into(),
            target_handle: target_handle.into(),
        }
    }
}

// Editors emit `null` for handles on nodes with a single unnamed port.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Value(s) delivered to one input port
///
/// A port fed by one edge holds a single value; every further edge into the
/// same port turns it into a list, in edge declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Single(serde_json::Value),
    Many(Vec<serde_json::Value>),
}

impl InputValue {
    /// Add another producer's value to this port
    pub fn push(&mut self, value: serde_json::Value) {
        match self {
            Self::Single(existing) => {
                let first = std::mem::take(existing);
                *self = Self::Many(vec![first, value]);
            }
            Self::Many(values) => values.push(value),
        }
    }

    /// Number of producers feeding this port
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Many(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The first producer's value
    pub fn first(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Single(value) => Some(value),
            Self::Many(values) => values.first(),
        }
    }

    /// Iterate over every producer's value in edge order
    pub fn iter(&self) -> impl Iterator<Item = &serde_json::Value> {
        let values: &[serde_json::Value] = match self {
            Self::Single(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        };
        values.iter()
    }

    /// Convert into a JSON value (scalar or array)
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Self::Single(value) => value,
            Self::Many(values) => serde_json::Value::Array(values),
        }
    }
}

/// Build an output port value of the conventional `{type, value}` shape
pub fn port_value(kind: &str, value: impl Into<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({ "type": kind, "value": value.into() })
}

/// The payload of a port value: its `value` field, or the value itself
pub fn payload(value: &serde_json::Value) -> &serde_json::Value {
    value.get("value").unwrap_or(value)
}

/// A saved workflow as produced by the editor
///
/// Accepts both the stored envelope `{ id, name, data: { nodes, edges } }`
/// and a bare `{ nodes, edges }` object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDocument {
    pub id: String,
    pub name: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Deserialize)]
struct GraphBody {
    #[serde(default)]
    nodes: Vec<GraphNode>,
    #[serde(default)]
    edges: Vec<GraphEdge>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDocument {
    Envelope {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        data: GraphBody,
    },
    Bare {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(flatten)]
        body: GraphBody,
    },
}

impl<'de> Deserialize<'de> for WorkflowDocument {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (id, name, body) = match RawDocument::deserialize(deserializer)? {
            RawDocument::Envelope { id, name, data } => (id, name, data),
            RawDocument::Bare { id, name, body } => (id, name, body),
        };
        Ok(Self {
            id,
            name,
            nodes: body.nodes,
            edges: body.edges,
        })
    }
}

impl WorkflowDocument {
    /// Parse a workflow document from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a workflow document from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let document = Self::from_json_str(&content)?;
        log::debug!(
            "Loaded workflow '{}' from {:?} ({} nodes, {} edges)",
            document.id,
            path,
            document.nodes.len(),
            document.edges.len()
        );
        Ok(document)
    }

    /// Find a node by ID
    pub fn find_node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_node_wire_format() {
        let node: GraphNode = serde_json::from_value(json!({
            "id": "n1",
            "type": "text",
            "data": {"text": "hi"},
            "position": {"x": 10, "y": 20}
        }))
        .unwrap();
        assert_eq!(node.node_type, "text");
        assert_eq!(node.data["text"], "hi");

        let missing_data: GraphNode =
            serde_json::from_value(json!({"id": "n2", "type": "x"})).unwrap();
        assert!(missing_data.data.is_null());
    }

    #[test]
    fn test_edge_null_handles() {
        let edge: GraphEdge = serde_json::from_value(json!({
            "id": "e1",
            "source": "a",
            "target": "b",
            "sourceHandle": null,
            "targetHandle": "prompt"
        }))
        .unwrap();
        assert_eq!(edge.source_handle, "");
        assert_eq!(edge.target_handle, "prompt");
        assert_eq!(edge.id.as_deref(), Some("e1"));
    }

    #[test]
    fn test_input_value_push() {
        let mut input = InputValue::Single(json!(1));
        assert_eq!(input.len(), 1);
        input.push(json!(2));
        input.push(json!(3));
        assert_eq!(input, InputValue::Many(vec![json!(1), json!(2), json!(3)]));
        assert_eq!(input.first(), Some(&json!(1)));
        assert_eq!(input.iter().count(), 3);
        assert_eq!(input.into_json(), json!([1, 2, 3]));
    }

    #[test]
    fn test_payload() {
        assert_eq!(payload(&port_value("text", "hi")), &json!("hi"));
        assert_eq!(payload(&json!(7)), &json!(7));
    }

    #[test]
    fn test_document_envelope_and_bare() {
        let envelope = WorkflowDocument::from_json_str(
            r#"{"id": "wf", "name": "My Flow", "data": {"nodes": [{"id": "a", "type": "text"}], "edges": []}}"#,
        )
        .unwrap();
        assert_eq!(envelope.name, "My Flow");
        assert_eq!(envelope.nodes.len(), 1);

        let bare = WorkflowDocument::from_json_str(
            r#"{"nodes": [{"id": "a", "type": "text"}, {"id": "b", "type": "text"}],
                "edges": [{"source": "a", "target": "b", "sourceHandle": "default", "targetHandle": "text"}]}"#,
        )
        .unwrap();
        assert_eq!(bare.nodes.len(), 2);
        assert_eq!(bare.edges[0].target_handle, "text");
        assert!(bare.find_node("b").is_some());
    }

    #[test]
    fn test_document_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"id": "saved", "name": "Saved", "data": {{"nodes": [], "edges": []}}}}"#
        )
        .unwrap();

        let document = WorkflowDocument::load(file.path()).unwrap();
        assert_eq!(document.id, "saved");
        assert!(document.nodes.is_empty());

        assert!(WorkflowDocument::load("/nonexistent/workflow.json").is_err());
    }
}
