//! Topological layering
//!
//! Level-synchronous Kahn's algorithm: every node lands in the first layer
//! after all of its predecessors, so nodes sharing a layer never depend on
//! each other and may run concurrently. Layer contents follow the original
//! node order, which keeps runs reproducible.

use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::graph::DependencyGraph;
use crate::types::GraphNode;

/// Ordered groups of nodes; each group depends only on earlier groups
pub type ExecutionLayers<'a> = Vec<Vec<&'a GraphNode>>;

/// Compute execution layers for `nodes`
///
/// `graph` must have been built from the same nodes. Returns
/// [`EngineError::CyclicDependency`] when some nodes can never be placed.
pub fn compute_execution_layers<'a>(
    nodes: &'a [GraphNode],
    graph: &DependencyGraph,
) -> Result<ExecutionLayers<'a>> {
    let position: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(index, node)| (node.id.as_str(), index))
        .collect();

    let mut remaining: HashMap<&str, usize> = nodes
        .iter()
        .map(|node| {
            let degree = graph.in_degree.get(&node.id).copied().unwrap_or(0);
            (node.id.as_str(), degree)
        })
        .collect();

    let mut layers: ExecutionLayers<'a> = Vec::new();
    let mut current: Vec<&'a GraphNode> = nodes
        .iter()
        .filter(|node| remaining.get(node.id.as_str()) == Some(&0))
        .collect();
    let mut placed = 0;

    while !current.is_empty() {
        let mut ready: Vec<usize> = Vec::new();
        for node in &current {
            for edge in graph.outgoing(&node.id) {
                let Some(degree) = remaining.get_mut(edge.target.as_str()) else {
                    continue;
                };
                if *degree == 0 {
                    continue;
                }
                *degree -= 1;
                if *degree == 0 {
                    if let Some(&index) = position.get(edge.target.as_str()) {
                        ready.push(index);
                    }
                }
            }
        }

        placed += current.len();
        layers.push(current);

        ready.sort_unstable();
        current = ready.into_iter().map(|index| &nodes[index]).collect();
    }

    if placed < nodes.len() {
        let unplaced: Vec<_> = nodes
            .iter()
            .filter(|node| remaining.get(node.id.as_str()).is_some_and(|d| *d > 0))
            .map(|node| node.id.clone())
            .collect();
        log::warn!("Cyclic dependency among nodes: {:?}", unplaced);
        return Err(EngineError::CyclicDependency { unplaced });
    }

    Ok(layers)
}
