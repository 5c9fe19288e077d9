//! Shared test helpers: a contract-enforcing in-memory cache store and a
//! mock materializer.
//!
//! `MemoryCacheStore` implements the real store contract (per-key producer
//! serialization, nothing visible under a key after a failed producer,
//! invocation counting) against a temp directory, so pipeline tests can
//! verify stage sequencing and key derivation without a real storage
//! backend.

// unwrap/expect are acceptable in test support for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::cache::{CacheEntry, CacheStore, Producer};
use crate::error::{Error, Result};
use crate::materializer::{DownloadRequest, Materializer};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

/// In-memory cache store over a temp directory
pub(crate) struct MemoryCacheStore {
    root: PathBuf,
    key_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    invocations: Mutex<HashMap<String, usize>>,
    live_locks: Arc<AtomicUsize>,
}

impl MemoryCacheStore {
    pub(crate) fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            key_locks: Mutex::new(HashMap::new()),
            invocations: Mutex::new(HashMap::new()),
            live_locks: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// How many times the producer for `key` has run
    pub(crate) fn producer_invocations(&self, key: &str) -> usize {
        self.invocations
            .lock()
            .expect("invocation map poisoned")
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Total producer runs across all keys
    pub(crate) fn total_invocations(&self) -> usize {
        self.invocations
            .lock()
            .expect("invocation map poisoned")
            .values()
            .sum()
    }

    /// Keys that have had their producer run, sorted
    pub(crate) fn produced_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .invocations
            .lock()
            .expect("invocation map poisoned")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Number of outstanding [`CacheEntry`] handles
    pub(crate) fn live_locks(&self) -> usize {
        self.live_locks.load(Ordering::SeqCst)
    }

    fn key_lock(&self, key: &str) -> Arc<AsyncMutex<()>> {
        Arc::clone(
            self.key_locks
                .lock()
                .expect("key lock map poisoned")
                .entry(key.to_owned())
                .or_default(),
        )
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get_or_create(&self, key: &str, producer: Producer) -> Result<CacheEntry> {
        // At most one producer per key among concurrent callers
        let key_lock = self.key_lock(key);
        let guard = key_lock.lock().await;

        let path = self.root.join(key);
        if !path.exists() {
            let temp = self.root.join(format!("{key}.producing"));
            *self
                .invocations
                .lock()
                .expect("invocation map poisoned")
                .entry(key.to_owned())
                .or_insert(0) += 1;
            match producer(temp.clone()).await {
                Ok(()) => {
                    std::fs::rename(&temp, &path)
                        .map_err(|e| Error::Cache(format!("failed to publish {key}: {e}")))?;
                }
                Err(err) => {
                    // A failing producer leaves nothing visible under the key
                    if temp.is_dir() {
                        let _ = std::fs::remove_dir_all(&temp);
                    } else {
                        let _ = std::fs::remove_file(&temp);
                    }
                    return Err(err);
                }
            }
        }
        drop(guard);

        let live = Arc::clone(&self.live_locks);
        live.fetch_add(1, Ordering::SeqCst);
        Ok(CacheEntry::new(path, move || {
            live.fetch_sub(1, Ordering::SeqCst);
        }))
    }
}

/// Materializer that writes fixed CSV content, or fails on demand
pub(crate) struct MockMaterializer {
    content: String,
    downloads: AtomicUsize,
    requests: Mutex<Vec<DownloadRequest>>,
    failure: Option<Box<dyn Fn() -> Error + Send + Sync>>,
}

impl MockMaterializer {
    pub(crate) fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            downloads: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            failure: None,
        }
    }

    /// A materializer whose every download fails with the produced error
    pub(crate) fn failing<F>(failure: F) -> Self
    where
        F: Fn() -> Error + Send + Sync + 'static,
    {
        Self {
            content: String::new(),
            downloads: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            failure: Some(Box::new(failure)),
        }
    }

    pub(crate) fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub(crate) fn last_request(&self) -> Option<DownloadRequest> {
        self.requests
            .lock()
            .expect("request log poisoned")
            .last()
            .cloned()
    }
}

#[async_trait]
impl Materializer for MockMaterializer {
    async fn download(&self, request: &DownloadRequest, destination: &Path) -> Result<()> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("request log poisoned")
            .push(request.clone());
        if let Some(failure) = &self.failure {
            return Err(failure());
        }
        std::fs::write(destination, &self.content)?;
        Ok(())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_producer(content: &'static [u8]) -> Producer {
        Box::new(move |destination: PathBuf| {
            Box::pin(async move {
                std::fs::write(&destination, content)?;
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn producer_runs_once_per_key() {
        let temp = TempDir::new().unwrap();
        let store = MemoryCacheStore::new(temp.path());

        let first = store.get_or_create("k.csv", file_producer(b"one")).await.unwrap();
        let second = store.get_or_create("k.csv", file_producer(b"two")).await.unwrap();

        assert_eq!(store.producer_invocations("k.csv"), 1);
        assert_eq!(first.path(), second.path());
        assert_eq!(std::fs::read(first.path()).unwrap(), b"one");
    }

    #[tokio::test]
    async fn failed_producer_leaves_nothing_visible() {
        let temp = TempDir::new().unwrap();
        let store = MemoryCacheStore::new(temp.path());

        let failing: Producer = Box::new(|destination: PathBuf| {
            Box::pin(async move {
                std::fs::write(&destination, b"partial")?;
                Err(Error::Download("connection reset".into()))
            })
        });
        let err = store.get_or_create("k.csv", failing).await.unwrap_err();
        assert!(matches!(err, Error::Download(_)));
        assert!(!temp.path().join("k.csv").exists());
        assert!(!temp.path().join("k.csv.producing").exists());

        // A later caller can still produce the artifact
        let entry = store.get_or_create("k.csv", file_producer(b"good")).await.unwrap();
        assert_eq!(std::fs::read(entry.path()).unwrap(), b"good");
        assert_eq!(store.producer_invocations("k.csv"), 2);
    }

    #[tokio::test]
    async fn live_lock_count_tracks_entries() {
        let temp = TempDir::new().unwrap();
        let store = MemoryCacheStore::new(temp.path());

        let first = store.get_or_create("k.csv", file_producer(b"x")).await.unwrap();
        let second = store.get_or_create("k.csv", file_producer(b"x")).await.unwrap();
        assert_eq!(store.live_locks(), 2);

        drop(first);
        assert_eq!(store.live_locks(), 1);
        second.release();
        assert_eq!(store.live_locks(), 0);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_producer() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryCacheStore::new(temp.path()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let slow: Producer = Box::new(|destination: PathBuf| {
                    Box::pin(async move {
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        std::fs::write(&destination, b"shared")?;
                        Ok(())
                    })
                });
                let entry = store.get_or_create("k.csv", slow).await.unwrap();
                std::fs::read(entry.path()).unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), b"shared");
        }
        assert_eq!(store.producer_invocations("k.csv"), 1);
    }
}
