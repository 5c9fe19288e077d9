//! Format writers and the writer registry
//!
//! A writer converts canonical CSV content into one output format. Writers
//! are external collaborators: this crate defines the seam and the registry
//! that resolves a format name to a factory, and fails with
//! [`Error::UnsupportedFormat`] when nothing is registered.

use crate::error::{Error, Result};
use crate::types::{DatasetMetadata, FormatOptions};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Factory for one output format's writers
pub trait WriterFactory: Send + Sync {
    /// The format name this factory serves (e.g. `"d3m"`)
    fn format(&self) -> &str;

    /// Validate and normalize raw format options
    ///
    /// The default body rejects any non-empty options: a factory that keeps
    /// it does not support options at all. Factories with real options
    /// override this to parse and normalize them, failing with
    /// [`Error::InvalidOptions`] on rejection.
    fn parse_options(&self, raw: &FormatOptions) -> Result<FormatOptions> {
        if raw.is_empty() {
            Ok(FormatOptions::new())
        } else {
            Err(Error::invalid_options(format!(
                "{} output takes no options",
                self.format()
            )))
        }
    }

    /// Instantiate a writer against `destination` with normalized options
    ///
    /// The destination may end up as a single file or a directory; the
    /// pipeline packages directory-shaped results into a single archive.
    fn create(&self, destination: &Path, options: &FormatOptions) -> Result<Box<dyn FormatWriter>>;
}

impl std::fmt::Debug for dyn WriterFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterFactory")
            .field("format", &self.format())
            .finish()
    }
}

/// One in-flight conversion
pub trait FormatWriter: Send {
    /// Attach dataset identity and metadata before any bytes are written
    fn set_metadata(&mut self, dataset_id: &str, metadata: &DatasetMetadata);

    /// Open the byte sink the canonical CSV content is streamed into
    fn open_sink(&mut self) -> Result<Box<dyn Write + Send + '_>>;

    /// Finalize the output after the sink is closed
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Registry resolving format names to writer factories
#[derive(Clone, Default)]
pub struct WriterRegistry {
    factories: HashMap<String, Arc<dyn WriterFactory>>,
}

impl WriterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under its own format name, replacing any previous
    /// registration for that format
    pub fn register(&mut self, factory: Arc<dyn WriterFactory>) {
        self.factories.insert(factory.format().to_owned(), factory);
    }

    /// Resolve the factory for `format`
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] when no factory is registered.
    pub fn get(&self, format: &str) -> Result<Arc<dyn WriterFactory>> {
        self.factories
            .get(format)
            .cloned()
            .ok_or_else(|| Error::unsupported_format(format))
    }

    /// The registered format names, unordered
    pub fn formats(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}
