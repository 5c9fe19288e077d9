//! Cache store collaborator interface
//!
//! The cache store is the only synchronization boundary in the pipeline and
//! may be shared across processes or machines. This crate consumes a single
//! get-or-create contract from it and never implements eviction, persistence,
//! or cross-process locking itself.
//!
//! Contract required of every implementation:
//! - for any key, at most one producer executes at a time across all
//!   concurrent callers; other callers for the same key block until the first
//!   completes and then observe the identical, fully-produced artifact;
//! - an artifact is never removed while any caller holds a [`CacheEntry`]
//!   on it;
//! - a failing producer leaves nothing visible under its key.

use crate::error::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::path::{Path, PathBuf};

/// Callback that fully populates a cache artifact at the given temporary path
///
/// The path may become a file or a directory; the producer must either
/// populate it completely or fail, in which case the store discards whatever
/// was written.
pub type Producer = Box<dyn FnOnce(PathBuf) -> BoxFuture<'static, Result<()>> + Send>;

/// Get-or-create artifact store keyed by cache keys
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Return a locked handle to the artifact for `key`, producing it first
    /// if no artifact exists yet
    ///
    /// `producer` is invoked at most once per key among all concurrent
    /// callers. The returned entry keeps the artifact pinned until released.
    async fn get_or_create(&self, key: &str, producer: Producer) -> Result<CacheEntry>;
}

/// Scoped handle to a cached artifact
///
/// Holding an entry pins the artifact in the store. The pin is released by
/// [`CacheEntry::release`] or on drop, whichever comes first.
pub struct CacheEntry {
    path: PathBuf,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl CacheEntry {
    /// Create an entry from an artifact path and its release callback
    pub fn new(path: PathBuf, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            path,
            release: Some(Box::new(release)),
        }
    }

    /// The artifact's location on durable storage
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the pin on the artifact
    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for CacheEntry {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("path", &self.path)
            .field("held", &self.release.is_some())
            .finish()
    }
}
