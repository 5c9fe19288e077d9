//! Core types for dataset-dl

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Key under which the materialize spec lives inside dataset metadata
pub(crate) const MATERIALIZE_KEY: &str = "materialize";

/// Key under which applied conversion-step descriptions accumulate inside
/// the materialize spec
pub(crate) const CONVERT_KEY: &str = "convert";

/// Metadata describing a dataset
///
/// An arbitrary-depth JSON mapping carrying size, provenance, and a nested
/// materialize spec. Values are treated as immutable: every pipeline stage
/// that needs a different logical identity builds a *new* metadata value via
/// [`DatasetMetadata::with_convert_step`] instead of mutating in place, so a
/// later stage can never corrupt an earlier stage's already-computed cache
/// key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetMetadata(Map<String, Value>);

impl DatasetMetadata {
    /// Create metadata from a JSON object map
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Create metadata from a JSON value, which must be an object
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(crate::Error::Serialization(serde::de::Error::custom(
                format!("dataset metadata must be a JSON object, got {other}"),
            ))),
        }
    }

    /// Borrow the underlying field map
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// The dataset size in bytes, if recorded
    pub fn size(&self) -> Option<u64> {
        self.0.get("size").and_then(Value::as_u64)
    }

    /// The materialize spec, or an empty object when none is recorded
    pub fn materialize(&self) -> Value {
        self.0
            .get(MATERIALIZE_KEY)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// A new metadata value with `description` appended to the materialize
    /// spec's list of applied conversion steps
    ///
    /// Appending to this list is the only way a transform changes the derived
    /// cache key.
    #[must_use]
    pub fn with_convert_step(&self, description: &Value) -> Self {
        let mut materialize = match self.materialize() {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        let mut convert = match materialize.get(CONVERT_KEY) {
            Some(Value::Array(steps)) => steps.clone(),
            _ => Vec::new(),
        };
        convert.push(description.clone());
        materialize.insert(CONVERT_KEY.to_owned(), Value::Array(convert));

        let mut fields = self.0.clone();
        fields.insert(MATERIALIZE_KEY.to_owned(), Value::Object(materialize));
        Self(fields)
    }
}

/// Format options for a conversion writer
///
/// A flat JSON mapping of writer-specific settings. An empty value means the
/// caller supplied no options.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatOptions(Map<String, Value>);

impl FormatOptions {
    /// Create empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Create options from a JSON object map
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Whether no options were supplied
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying option map
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Look up a single option value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// Function applied by a transform step
///
/// Consumes the previous stage's artifact path and populates the destination
/// path with the transformed artifact.
pub type TransformFn = Arc<dyn Fn(&Path, &Path) -> Result<()> + Send + Sync>;

/// A single transformation applied to a materialized CSV
///
/// The description is appended to the metadata's materialize spec before the
/// transformed artifact's cache key is computed, so every transform (and
/// every distinct transform order) produces a distinct cache identity.
#[derive(Clone)]
pub struct TransformStep {
    function: TransformFn,
    description: Value,
}

impl TransformStep {
    /// Create a transform step from its description and function
    pub fn new<F>(description: Value, function: F) -> Self
    where
        F: Fn(&Path, &Path) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            function: Arc::new(function),
            description,
        }
    }

    /// The description recorded in the materialize spec
    pub fn description(&self) -> &Value {
        &self.description
    }

    /// The transform function, cheaply cloneable for producer closures
    pub(crate) fn function(&self) -> TransformFn {
        Arc::clone(&self.function)
    }
}

impl fmt::Debug for TransformStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformStep")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
