//! Control nodes
//!
//! Nodes that combine values from several branches.

mod merge;

pub use merge::{MergeConfig, MergeExecutor};
