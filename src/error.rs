//! Error types for dataset-dl
//!
//! This module provides error handling for the library, including:
//! - Option validation and format resolution errors surfaced by the pipeline
//! - Download and conversion failures propagated from collaborators
//! - Packaging errors with context about the offending path

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for dataset-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for dataset-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Format options were supplied for `csv`, supplied to a writer without
    /// options support, or rejected by the writer's own validator
    #[error("invalid output options: {reason}")]
    InvalidOptions {
        /// Why the options were rejected
        reason: String,
    },

    /// No writer is registered for the requested output format
    #[error("unsupported output format: {format}")]
    UnsupportedFormat {
        /// The format that has no registered writer
        format: String,
    },

    /// The base download would exceed the configured size ceiling
    #[error("dataset exceeds size limit of {limit} bytes")]
    SizeLimitExceeded {
        /// The configured ceiling in bytes
        limit: u64,
    },

    /// Download failed inside the materializer
    #[error("download error: {0}")]
    Download(String),

    /// Format conversion failed inside a writer
    #[error("conversion error: {0}")]
    Conversion(String),

    /// A transform step failed against the previous stage's artifact
    #[error("transform error: {0}")]
    Transform(String),

    /// The cache store failed to produce or hand out an artifact
    #[error("cache error: {0}")]
    Cache(String),

    /// Directory-to-archive packaging error
    #[error("packaging error: {0}")]
    Package(#[from] PackageError),

    /// The operation was cancelled via its cancellation token
    #[error("operation cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create an [`Error::InvalidOptions`] with the given reason
    pub fn invalid_options(reason: impl Into<String>) -> Self {
        Error::InvalidOptions {
            reason: reason.into(),
        }
    }

    /// Create an [`Error::UnsupportedFormat`] for the given format name
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Error::UnsupportedFormat {
            format: format.into(),
        }
    }
}

/// Packaging errors (directory-to-archive normalization)
#[derive(Debug, Error)]
pub enum PackageError {
    /// Writing the archive failed
    #[error("failed to write archive {archive}: {reason}")]
    ArchiveWrite {
        /// The archive file being written
        archive: PathBuf,
        /// The reason the write failed
        reason: String,
    },

    /// An entry resolved outside the directory being archived
    #[error("entry {entry} is outside archive root {root}")]
    EntryOutsideRoot {
        /// The offending entry
        entry: PathBuf,
        /// The directory being archived
        root: PathBuf,
    },

    /// Replacing the source directory with the finished archive failed
    #[error("failed to replace {path} with its archive: {reason}")]
    ReplaceFailed {
        /// The canonical artifact location
        path: PathBuf,
        /// The reason the swap failed
        reason: String,
    },
}
