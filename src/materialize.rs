//! Materialization orchestrator
//!
//! Retrieves a dataset in a caller-requested output format while minimizing
//! redundant downloads and conversions. The pipeline is linear: base CSV
//! retrieval, optional transform chain, optional format conversion. Every
//! stage resolves through the cache store with a key derived from all
//! content-relevant inputs, so concurrent requests for the identical
//! artifact share a single computation, and a different output format never
//! costs a second download.

use crate::cache::{CacheStore, Producer};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::key::dataset_cache_key;
use crate::materializer::{DownloadRequest, Materializer};
use crate::metrics::PipelineMetrics;
use crate::package;
use crate::scope::LockStack;
use crate::storage::{NoSharedStorage, SharedDatasetRoot, SharedStorage};
use crate::types::{DatasetMetadata, FormatOptions, TransformStep};
use crate::writer::{WriterFactory, WriterRegistry};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Canonical intermediate format every dataset is materialized into
const CSV_FORMAT: &str = "csv";

/// Options for one [`MaterializePipeline::acquire`] call
pub struct AcquireOptions {
    /// Requested output format (default: `csv`)
    pub format: String,
    /// Raw format options, validated against the resolved writer
    pub format_options: FormatOptions,
    /// Transformations applied to the materialized CSV, in order
    pub transforms: Vec<TransformStep>,
    /// Cancellation signal checked at every stage boundary
    pub cancel: CancellationToken,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            format: CSV_FORMAT.to_owned(),
            format_options: FormatOptions::new(),
            transforms: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }
}

impl AcquireOptions {
    /// Options requesting the given output format
    pub fn format(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            ..Self::default()
        }
    }

    /// Set raw format options
    #[must_use]
    pub fn with_format_options(mut self, format_options: FormatOptions) -> Self {
        self.format_options = format_options;
        self
    }

    /// Set the transform chain
    #[must_use]
    pub fn with_transforms(mut self, transforms: Vec<TransformStep>) -> Self {
        self.transforms = transforms;
        self
    }

    /// Set the cancellation token
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Scoped handle to a fully-produced dataset artifact
///
/// The handle keeps the artifact's cache locks held; dropping it releases
/// them. Artifacts read from shared storage hold no locks.
#[derive(Debug)]
pub struct DatasetHandle {
    path: PathBuf,
    locks: LockStack,
}

impl DatasetHandle {
    /// The artifact's location on durable storage
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of cache locks this handle keeps held
    pub fn held_locks(&self) -> usize {
        self.locks.len()
    }
}

/// The dataset materialization pipeline
///
/// Wires the cache store, materializer, writer registry, and shared-storage
/// lookup together. One pipeline serves any number of concurrent `acquire`
/// calls; the cache store is the only synchronization boundary.
pub struct MaterializePipeline {
    config: PipelineConfig,
    store: Arc<dyn CacheStore>,
    materializer: Arc<dyn Materializer>,
    writers: WriterRegistry,
    shared: Arc<dyn SharedStorage>,
    metrics: Arc<PipelineMetrics>,
}

impl MaterializePipeline {
    /// Create a pipeline from its configuration and collaborators
    ///
    /// When `config.shared_storage_root` is set, datasets found under that
    /// root bypass the cache system; otherwise no bypass applies. Use
    /// [`MaterializePipeline::with_shared_storage`] to inject a custom
    /// lookup.
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn CacheStore>,
        materializer: Arc<dyn Materializer>,
        writers: WriterRegistry,
    ) -> Self {
        let shared: Arc<dyn SharedStorage> = match &config.shared_storage_root {
            Some(root) => Arc::new(SharedDatasetRoot::new(root.clone())),
            None => Arc::new(NoSharedStorage),
        };
        Self {
            config,
            store,
            materializer,
            writers,
            shared,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Replace the shared-storage lookup
    #[must_use]
    pub fn with_shared_storage(mut self, shared: Arc<dyn SharedStorage>) -> Self {
        self.shared = shared;
        self
    }

    /// The pipeline's duration metrics
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Materialize `dataset_id` in the requested output format
    ///
    /// Stages run in order: shared-storage bypass or cached CSV download,
    /// the transform chain, then format conversion unless `csv` was
    /// requested. Each stage releases the locks of the stage it supersedes,
    /// so at most one stage's lock is held at a time; the returned handle
    /// keeps the final artifact pinned until dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidOptions`] for options supplied with `csv`, or
    ///   rejected by the resolved writer
    /// - [`Error::UnsupportedFormat`] when no writer serves the format
    /// - [`Error::Cancelled`] when the token fires between stages
    /// - download, transform, and conversion failures propagate unmodified;
    ///   nothing is retried at this layer
    pub async fn acquire(
        &self,
        dataset_id: &str,
        metadata: DatasetMetadata,
        options: AcquireOptions,
    ) -> Result<DatasetHandle> {
        if options.format.is_empty() {
            return Err(Error::invalid_options("output format must not be empty"));
        }

        info!(
            dataset_id,
            size = ?metadata.size(),
            format = %options.format,
            "acquiring dataset"
        );

        let cancel = &options.cancel;
        let mut locks = LockStack::new();
        let mut metadata = metadata;

        // Always materialize the CSV first and convert afterwards if needed;
        // requesting a new output format never costs a second download.
        ensure_live(cancel)?;
        let mut csv_path = match self.shared.lookup(dataset_id) {
            Some(path) => {
                // Permanently hosted outside the cache system; no lock taken.
                debug!(path = %path.display(), "reading from shared storage");
                path
            }
            None => {
                let key =
                    dataset_cache_key(dataset_id, &metadata, CSV_FORMAT, &FormatOptions::new())?;
                let producer = self.download_producer(dataset_id, &metadata);
                let entry = self.store.get_or_create(&key, producer).await?;
                locks.push(entry)
            }
        };

        // Apply requested transformations, one cached stage per step
        for step in &options.transforms {
            ensure_live(cancel)?;
            metadata = metadata.with_convert_step(step.description());
            let key = dataset_cache_key(dataset_id, &metadata, CSV_FORMAT, &FormatOptions::new())?;

            let function = step.function();
            let previous = csv_path.clone();
            let producer: Producer = Box::new(move |destination: PathBuf| {
                Box::pin(async move { function(&previous, &destination) })
            });

            // The superseded artifact is no longer needed once its
            // replacement exists.
            locks.release_all();
            let entry = self.store.get_or_create(&key, producer).await?;
            csv_path = locks.push(entry);
        }

        // If CSV was requested, stop here
        if options.format == CSV_FORMAT {
            if !options.format_options.is_empty() {
                return Err(Error::invalid_options("csv output takes no options"));
            }
            return Ok(DatasetHandle {
                path: csv_path,
                locks,
            });
        }

        // Otherwise, convert the current CSV to the requested format
        ensure_live(cancel)?;
        let factory = self.writers.get(&options.format)?;
        let normalized = factory.parse_options(&options.format_options)?;
        let key = dataset_cache_key(dataset_id, &metadata, &options.format, &normalized)?;

        let producer =
            self.convert_producer(dataset_id, &metadata, &options.format, factory, normalized, &csv_path);
        locks.release_all();
        let entry = self.store.get_or_create(&key, producer).await?;
        let path = locks.push(entry);

        Ok(DatasetHandle { path, locks })
    }

    fn download_producer(&self, dataset_id: &str, metadata: &DatasetMetadata) -> Producer {
        let materializer = Arc::clone(&self.materializer);
        let metrics = Arc::clone(&self.metrics);
        let request = DownloadRequest {
            dataset_id: dataset_id.to_owned(),
            metadata: metadata.clone(),
            selector: None,
            format: CSV_FORMAT.to_owned(),
            size_limit: self.config.size_limit,
        };
        Box::new(move |destination: PathBuf| {
            Box::pin(async move {
                info!(dataset_id = %request.dataset_id, "materializing CSV");
                let started = Instant::now();
                materializer.download(&request, &destination).await?;
                metrics.record_download(started.elapsed());
                Ok(())
            })
        })
    }

    fn convert_producer(
        &self,
        dataset_id: &str,
        metadata: &DatasetMetadata,
        format: &str,
        factory: Arc<dyn WriterFactory>,
        options: FormatOptions,
        csv_path: &Path,
    ) -> Producer {
        let metrics = Arc::clone(&self.metrics);
        let dataset_id = dataset_id.to_owned();
        let metadata = metadata.clone();
        let format = format.to_owned();
        let source = csv_path.to_path_buf();
        Box::new(move |destination: PathBuf| {
            Box::pin(async move {
                info!(format = %format, options = ?options, "converting CSV");
                let started = Instant::now();
                run_writer(
                    factory.as_ref(),
                    &source,
                    &destination,
                    &dataset_id,
                    &metadata,
                    &options,
                )?;
                if destination.is_dir() {
                    info!("conversion produced a directory, packaging into an archive");
                    package::archive_directory(&destination)?;
                }
                metrics.record_convert(started.elapsed());
                Ok(())
            })
        })
    }
}

/// Stream the CSV artifact's full byte content through a writer
fn run_writer(
    factory: &dyn WriterFactory,
    source: &Path,
    destination: &Path,
    dataset_id: &str,
    metadata: &DatasetMetadata,
    options: &FormatOptions,
) -> Result<()> {
    let mut writer = factory.create(destination, options)?;
    writer.set_metadata(dataset_id, metadata);
    let mut csv = File::open(source)?;
    {
        let mut sink = writer.open_sink()?;
        io::copy(&mut csv, &mut sink)?;
    }
    writer.finish()
}

fn ensure_live(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}
