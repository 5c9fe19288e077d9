//! Pre-materialized shared storage lookup
//!
//! Some datasets are permanently hosted on shared storage outside the cache
//! system. For those, the pipeline reads the canonical CSV directly: no lock
//! is taken and the cache store is never involved. The lookup is an injected
//! collaborator so the pipeline stays testable without real mounts.

use crate::key::encode_dataset_id;
use std::path::{Path, PathBuf};

/// Filename of the canonical CSV inside a shared dataset directory
const SHARED_CSV_NAME: &str = "main.csv";

/// Read-only lookup of permanently hosted datasets
pub trait SharedStorage: Send + Sync {
    /// The canonical CSV path for `dataset_id`, if it is hosted here
    fn lookup(&self, dataset_id: &str) -> Option<PathBuf>;
}

/// Shared storage rooted at a fixed directory
///
/// A dataset lives at `<root>/<encoded id>/main.csv`; the lookup hits only
/// when the dataset's directory exists.
#[derive(Clone, Debug)]
pub struct SharedDatasetRoot {
    root: PathBuf,
}

impl SharedDatasetRoot {
    /// Create a lookup over the given root directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The configured root directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SharedStorage for SharedDatasetRoot {
    fn lookup(&self, dataset_id: &str) -> Option<PathBuf> {
        let dir = self.root.join(encode_dataset_id(dataset_id));
        dir.is_dir().then(|| dir.join(SHARED_CSV_NAME))
    }
}

/// Lookup that never matches, for deployments without shared storage
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSharedStorage;

impl SharedStorage for NoSharedStorage {
    fn lookup(&self, _dataset_id: &str) -> Option<PathBuf> {
        None
    }
}
