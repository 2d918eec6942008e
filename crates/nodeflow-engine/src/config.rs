//! Configuration for the workflow runner

use serde::{Deserialize, Serialize};

/// Defaults for [`RunnerConfig`]
pub mod defaults {
    /// Prefix for generated execution IDs
    pub const EXECUTION_ID_PREFIX: &str = "dag-exec";
}

/// Runner settings
///
/// These shape scheduling and bookkeeping. A successful run computes the
/// same outputs under any setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunnerConfig {
    /// Upper bound on nodes executing at once within a layer (`None` = whole layer)
    pub max_concurrency: Option<usize>,
    /// Prefix for generated execution IDs (`{prefix}-{uuid}`)
    pub execution_id_prefix: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            execution_id_prefix: defaults::EXECUTION_ID_PREFIX.to_string(),
        }
    }
}

impl RunnerConfig {
    /// Limit how many nodes of a layer run concurrently (0 is treated as 1)
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit.max(1));
        self
    }

    /// Set the execution ID prefix
    pub fn with_execution_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.execution_id_prefix = prefix.into();
        self
    }

    /// Effective concurrency for a layer of `layer_len` scheduled nodes
    pub(crate) fn concurrency_for(&self, layer_len: usize) -> usize {
        self.max_concurrency
            .unwrap_or(layer_len)
            .min(layer_len)
            .max(1)
    }
}
