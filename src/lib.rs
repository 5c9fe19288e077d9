//! # dataset-dl
//!
//! Dataset materialization and format-conversion cache library.
//!
//! ## Design Philosophy
//!
//! dataset-dl is designed to be:
//! - **Download-frugal** - Every dataset is materialized as CSV exactly once;
//!   requesting another output format converts the cached CSV instead of
//!   downloading again
//! - **Deterministic** - Cache identity is a content-addressable key over the
//!   dataset id, metadata, transform chain, format, and options
//! - **Coordinated** - Concurrent requests for the identical artifact share a
//!   single computation through the cache store's get-or-create contract
//! - **Library-first** - Storage, download, and format codecs are injected
//!   collaborators behind traits, purely a Rust crate for embedding
//!
//! ## Quick Start
//!
//! ```no_run
//! use dataset_dl::{
//!     AcquireOptions, CacheStore, DatasetMetadata, Materializer, MaterializePipeline,
//!     PipelineConfig, WriterRegistry,
//! };
//! use std::sync::Arc;
//!
//! async fn fetch(
//!     store: Arc<dyn CacheStore>,
//!     materializer: Arc<dyn Materializer>,
//! ) -> dataset_dl::Result<()> {
//!     let pipeline = MaterializePipeline::new(
//!         PipelineConfig::default(),
//!         store,
//!         materializer,
//!         WriterRegistry::new(),
//!     );
//!
//!     let metadata = DatasetMetadata::default();
//!     let dataset = pipeline
//!         .acquire("my.dataset", metadata, AcquireOptions::default())
//!         .await?;
//!     println!("CSV at {}", dataset.path().display());
//!     // Cache locks are released when `dataset` drops
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Cache store collaborator interface
pub mod cache;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Cache key derivation
pub mod key;
/// Materialization orchestrator
pub mod materialize;
/// Materializer (download) collaborator interface
pub mod materializer;
/// Pipeline duration metrics
pub mod metrics;
/// Directory-to-archive packaging
pub mod package;
/// Scoped lock management
pub mod scope;
/// Pre-materialized shared storage lookup
pub mod storage;
/// Core types (metadata, transforms, format options)
pub mod types;
/// Format writers and the writer registry
pub mod writer;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use cache::{CacheEntry, CacheStore, Producer};
pub use config::PipelineConfig;
pub use error::{Error, PackageError, Result};
pub use key::{dataset_cache_key, encode_dataset_id};
pub use materialize::{AcquireOptions, DatasetHandle, MaterializePipeline};
pub use materializer::{DownloadRequest, Materializer};
pub use metrics::{DURATION_BUCKETS, HistogramSnapshot, PipelineMetrics};
pub use scope::LockStack;
pub use storage::{NoSharedStorage, SharedDatasetRoot, SharedStorage};
pub use types::{DatasetMetadata, FormatOptions, TransformFn, TransformStep};
pub use writer::{FormatWriter, WriterFactory, WriterRegistry};
