//! Processing nodes
//!
//! Nodes that transform data on its way through the graph.

mod json_extract;

pub use json_extract::{JsonExtractConfig, JsonExtractExecutor};
