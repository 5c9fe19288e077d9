//! Cache key derivation
//!
//! A cache key is a deterministic, filename-safe identity for one
//! (dataset, transform chain, output format, options) combination:
//! `encode_dataset_id(id) + "_" + hex(sha256) + "." + format`. The digest
//! covers a canonical JSON rendering of every content-relevant input, so
//! logically-equal inputs always map to the same key while any change to the
//! materialize spec, format, or options produces a new one.

use crate::error::{Error, Result};
use crate::types::{DatasetMetadata, FormatOptions, MATERIALIZE_KEY};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

/// Encode a dataset id into a storage-namespace-safe string
///
/// Percent-encodes every byte outside `[A-Za-z0-9_.~-]`, making the result
/// safe both as a URL path segment and as a filename component.
pub fn encode_dataset_id(dataset_id: &str) -> String {
    urlencoding::encode(dataset_id).into_owned()
}

/// Canonical hex digest of a JSON value
///
/// Object keys serialize in sorted order, so two maps holding the same
/// entries hash identically regardless of insertion order; array order is
/// preserved and significant.
pub(crate) fn hash_value(value: &Value) -> Result<String> {
    let canonical = serde_json::to_vec(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Derive the cache key for one materialization output
///
/// For `csv` the metadata is reduced to `{id}` plus the materialize spec, so
/// unrelated metadata fields never invalidate the CSV cache, and supplying
/// any format options is an error. For other formats the whole metadata (plus
/// the id, minus the materialize spec which is hashed as its own field)
/// participates in the digest, as do the normalized format options.
///
/// # Errors
///
/// Returns [`Error::InvalidOptions`] when `format` is `csv` and
/// `format_options` is non-empty.
pub fn dataset_cache_key(
    dataset_id: &str,
    metadata: &DatasetMetadata,
    format: &str,
    format_options: &FormatOptions,
) -> Result<String> {
    let (metadata_fields, materialize) = if format == "csv" {
        if !format_options.is_empty() {
            return Err(Error::invalid_options("csv output takes no options"));
        }
        let mut reduced = Map::new();
        reduced.insert("id".to_owned(), Value::String(dataset_id.to_owned()));
        (reduced, metadata.materialize())
    } else {
        let mut full = metadata.fields().clone();
        full.insert("id".to_owned(), Value::String(dataset_id.to_owned()));
        let materialize = full
            .remove(MATERIALIZE_KEY)
            .unwrap_or_else(|| Value::Object(Map::new()));
        (full, materialize)
    };

    // The crate version is deliberately NOT part of the digest: cache entries
    // survive software upgrades, and clearing the cache after an incompatible
    // upgrade is an operator action.
    let digest_input = json!({
        "format": format,
        "format_options": format_options,
        "metadata": metadata_fields,
        "materialize": materialize,
    });
    let digest = hash_value(&digest_input)?;

    Ok(format!(
        "{}_{}.{}",
        encode_dataset_id(dataset_id),
        digest,
        format
    ))
}
