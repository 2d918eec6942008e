//! Structural validation for workflow graphs
//!
//! Reports every problem found rather than stopping at the first. Nothing
//! here is enforced by the runner: unknown edge endpoints are skipped and
//! cycles fail at layering time. Editors call this to surface problems
//! before a run.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::types::{GraphEdge, GraphNode};

/// Validation error with location context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Two or more nodes share an id
    DuplicateNodeId { node_id: String },
    /// An edge references a non-existent node
    UnknownNode { edge: String, node_id: String },
    /// An edge connects a node to itself
    SelfLoop { edge: String, node_id: String },
    /// Cycle detected among the listed nodes
    CycleDetected { nodes: Vec<String> },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateNodeId { node_id } => write!(f, "Duplicate node id '{}'", node_id),
            Self::UnknownNode { edge, node_id } => {
                write!(f, "Edge '{}' references unknown node '{}'", edge, node_id)
            }
            Self::SelfLoop { edge, node_id } => {
                write!(f, "Edge '{}' connects node '{}' to itself", edge, node_id)
            }
            Self::CycleDetected { nodes } => {
                write!(f, "Cycle detected between nodes: {}", nodes.join(", "))
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a workflow graph
///
/// Returns all validation errors found (not just the first).
pub fn validate_workflow(nodes: &[GraphNode], edges: &[GraphEdge]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_node_ids(nodes, &mut errors);
    validate_edge_references(nodes, edges, &mut errors);
    detect_cycles(nodes, edges, &mut errors);

    errors
}

/// Edges without an editor id are labelled by position
fn edge_label(index: usize, edge: &GraphEdge) -> String {
    edge.id.clone().unwrap_or_else(|| format!("#{index}"))
}

fn validate_node_ids(nodes: &[GraphNode], errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for node in nodes {
        if !seen.insert(node.id.as_str()) && reported.insert(node.id.as_str()) {
            errors.push(ValidationError::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }
    }
}

/// Check that all edge source/target nodes exist
fn validate_edge_references(
    nodes: &[GraphNode],
    edges: &[GraphEdge],
    errors: &mut Vec<ValidationError>,
) {
    let node_ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

    for (index, edge) in edges.iter().enumerate() {
        for endpoint in [&edge.source, &edge.target] {
            if !node_ids.contains(endpoint.as_str()) {
                errors.push(ValidationError::UnknownNode {
                    edge: edge_label(index, edge),
                    node_id: endpoint.clone(),
                });
            }
        }
        if edge.source == edge.target && node_ids.contains(edge.source.as_str()) {
            errors.push(ValidationError::SelfLoop {
                edge: edge_label(index, edge),
                node_id: edge.source.clone(),
            });
        }
    }
}

/// Detect cycles using Kahn's algorithm; self-loops are reported separately
fn detect_cycles(nodes: &[GraphNode], edges: &[GraphEdge], errors: &mut Vec<ValidationError>) {
    let mut in_degree: HashMap<&str, usize> = nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
    let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges {
        if edge.source == edge.target
            || !in_degree.contains_key(edge.source.as_str())
            || !in_degree.contains_key(edge.target.as_str())
        {
            continue;
        }
        successors
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
        if let Some(deg) = in_degree.get_mut(edge.target.as_str()) {
            *deg += 1;
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();

    while let Some(node_id) = queue.pop_front() {
        for &target in successors.get(node_id).into_iter().flatten() {
            if let Some(deg) = in_degree.get_mut(target) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(target);
                }
            }
        }
    }

    // Report in node order; each id once even if duplicated.
    let mut reported = HashSet::new();
    let stuck: Vec<String> = nodes
        .iter()
        .filter(|n| in_degree.get(n.id.as_str()).is_some_and(|&deg| deg > 0))
        .filter(|n| reported.insert(n.id.as_str()))
        .map(|n| n.id.clone())
        .collect();

    if !stuck.is_empty() {
        errors.push(ValidationError::CycleDetected { nodes: stuck });
    }
}
