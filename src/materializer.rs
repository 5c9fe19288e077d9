//! Materializer collaborator interface
//!
//! The materializer owns the byte-level download of a dataset's canonical
//! form. This crate only drives it: the base pipeline stage asks for a CSV
//! rendition under a hard size ceiling and caches whatever comes back.

use crate::error::Result;
use crate::types::DatasetMetadata;
use async_trait::async_trait;
use std::path::Path;

/// Everything a materializer needs to produce one dataset rendition
#[derive(Clone, Debug)]
pub struct DownloadRequest {
    /// Stable dataset identifier
    pub dataset_id: String,
    /// Full dataset metadata, including the materialize spec
    pub metadata: DatasetMetadata,
    /// Optional column/row selector; `None` downloads the whole dataset
    pub selector: Option<Vec<String>>,
    /// Requested rendition format
    pub format: String,
    /// Hard ceiling on the produced content, in bytes
    pub size_limit: u64,
}

/// Download capability for dataset materialization
///
/// Implementations fetch the dataset described by the request and write it to
/// `destination`. Retry policy, if any, lives inside the implementation; the
/// pipeline never retries.
#[async_trait]
pub trait Materializer: Send + Sync {
    /// Materialize the requested rendition at `destination`
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SizeLimitExceeded`] when the produced content
    /// would exceed `request.size_limit`; any other failure is propagated
    /// unmodified to the caller.
    async fn download(&self, request: &DownloadRequest, destination: &Path) -> Result<()>;
}
