//! Configuration types for dataset-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Materialization pipeline configuration
///
/// All fields have sensible defaults; a zero-configuration pipeline caches
/// downloads capped at 10 GB and uses no shared storage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Hard ceiling on a base download, in bytes (default: 10 GB)
    #[serde(default = "default_size_limit")]
    pub size_limit: u64,

    /// Root directory of pre-materialized shared storage, if mounted
    ///
    /// Datasets found under this root are read directly and bypass the cache
    /// system entirely.
    #[serde(default)]
    pub shared_storage_root: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            size_limit: default_size_limit(),
            shared_storage_root: None,
        }
    }
}

fn default_size_limit() -> u64 {
    10_000_000_000 // 10 GB
}
