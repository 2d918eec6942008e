//! Dependency graph construction
//!
//! Turns the flat node and edge lists into the three lookup tables the
//! scheduler works from: outgoing adjacency, in-degree, and the
//! de-duplicated list of direct predecessors.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::types::{GraphEdge, GraphNode, NodeId, PortId};

/// An outgoing connection, stored under its source node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjacentEdge {
    pub target: NodeId,
    pub source_handle: PortId,
    pub target_handle: PortId,
}

/// Lookup tables derived from a workflow's nodes and edges
///
/// Built once per run and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Outgoing edges per node, in edge order (duplicates kept)
    pub adjacency: HashMap<NodeId, Vec<AdjacentEdge>>,
    /// Incoming edge count per node (duplicates counted)
    pub in_degree: HashMap<NodeId, usize>,
    /// Distinct direct predecessors per node, in first-seen order
    pub dependencies: HashMap<NodeId, Vec<NodeId>>,
}

impl DependencyGraph {
    /// Outgoing edges of a node
    pub fn outgoing(&self, node_id: &str) -> &[AdjacentEdge] {
        self.adjacency.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct direct predecessors of a node
    pub fn predecessors(&self, node_id: &str) -> &[NodeId] {
        self.dependencies
            .get(node_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct nodes feeding into this node
    pub fn fan_in(&self, node_id: &str) -> usize {
        self.predecessors(node_id).len()
    }

    /// Whether the node is tracked by this graph
    pub fn contains(&self, node_id: &str) -> bool {
        self.in_degree.contains_key(node_id)
    }
}

/// Build the adjacency, in-degree and predecessor tables
///
/// Every node gets an entry in all three tables even without edges. Edges
/// whose endpoints are not in `nodes` are skipped; malformed graphs are not
/// rejected here.
pub fn build_dependency_graph(nodes: &[GraphNode], edges: &[GraphEdge]) -> DependencyGraph {
    let mut graph = DependencyGraph::default();

    for node in nodes {
        graph.adjacency.insert(node.id.clone(), Vec::new());
        graph.in_degree.insert(node.id.clone(), 0);
        graph.dependencies.insert(node.id.clone(), Vec::new());
    }

    for edge in edges {
        if !graph.contains(&edge.source) || !graph.contains(&edge.target) {
            log::debug!(
                "Skipping edge {} -> {}: endpoint not in workflow",
                edge.source,
                edge.target
            );
            continue;
        }

        if let Some(outgoing) = graph.adjacency.get_mut(&edge.source) {
            outgoing.push(AdjacentEdge {
                target: edge.target.clone(),
                source_handle: edge.source_handle.clone(),
                target_handle: edge.target_handle.clone(),
            });
        }
        if let Some(degree) = graph.in_degree.get_mut(&edge.target) {
            *degree += 1;
        }
        if let Some(deps) = graph.dependencies.get_mut(&edge.target) {
            if !deps.contains(&edge.source) {
                deps.push(edge.source.clone());
            }
        }
    }

    graph
}

/// Every node the target transitively depends on, excluding the target itself
/// (unless it sits on a cycle through itself)
pub fn upstream_closure(target: &str, graph: &DependencyGraph) -> HashSet<NodeId> {
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(target);

    while let Some(node_id) = queue.pop_front() {
        for dep in graph.predecessors(node_id) {
            if visited.insert(dep.clone()) {
                queue.push_back(dep.as_str());
            }
        }
    }

    visited
}
