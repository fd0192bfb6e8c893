//! Binary report stream decoding.
//!
//! Each module output directory holds up to five well-known record streams.
//! A missing stream is expected (older toolchains, partial builds) and only
//! logs a warning; a malformed stream fails that one stream and leaves its
//! siblings untouched.

pub mod cpd;
pub mod file_metadata;
pub mod highlights;
pub mod metrics;
pub mod records;
pub mod symbols;
pub mod wire;

use std::path::Path;

use ahash::AHashMap;
use serde::de::DeserializeOwned;

use crate::error::{Result, ScanMergeError};
use crate::index::FileIndex;
use crate::paths::PathResolver;
use crate::reconcile::FileFactBook;

pub const METRICS_STREAM: &str = "metrics.bin";
pub const HIGHLIGHTS_STREAM: &str = "highlights.bin";
pub const SYMBOL_REFS_STREAM: &str = "symbol-refs.bin";
pub const CPD_TOKENS_STREAM: &str = "cpd-tokens.bin";
pub const FILE_METADATA_STREAM: &str = "file-metadata.bin";

/// Everything one module's binary streams contributed.
#[derive(Default)]
pub struct ModuleBinaryData {
    pub measures: AHashMap<String, metrics::FileMeasures>,
    pub highlights: AHashMap<String, Vec<highlights::HighlightSpan>>,
    pub symbols: AHashMap<String, Vec<symbols::SymbolSpans>>,
    pub cpd_tokens: AHashMap<String, Vec<cpd::CpdToken>>,
    /// Streams that failed to decode. Siblings still import.
    pub failures: Vec<ScanMergeError>,
}

/// Load one stream from `dir`; `Ok(None)` when the file is absent.
fn load_stream<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<Option<Vec<T>>> {
    let path = dir.join(name);
    if !path.exists() {
        tracing::warn!("Report stream {} not found, skipping", path.display());
        return Ok(None);
    }
    wire::read_records(&path).map(Some)
}

/// Import the four per-module data streams from one report directory.
pub fn import_module_streams(
    dir: &Path,
    resolver: &PathResolver,
    index: &dyn FileIndex,
) -> ModuleBinaryData {
    let mut data = ModuleBinaryData::default();

    match load_stream::<records::MetricsRecord>(dir, METRICS_STREAM) {
        Ok(Some(records)) => data.measures = metrics::import(records, resolver, index),
        Ok(None) => {}
        Err(e) => data.failures.push(e),
    }
    match load_stream::<records::HighlightRecord>(dir, HIGHLIGHTS_STREAM) {
        Ok(Some(records)) => data.highlights = highlights::import(records, resolver, index),
        Ok(None) => {}
        Err(e) => data.failures.push(e),
    }
    match load_stream::<records::SymbolRecord>(dir, SYMBOL_REFS_STREAM) {
        Ok(Some(records)) => data.symbols = symbols::import(records, resolver, index),
        Ok(None) => {}
        Err(e) => data.failures.push(e),
    }
    match load_stream::<records::CpdRecord>(dir, CPD_TOKENS_STREAM) {
        Ok(Some(records)) => data.cpd_tokens = cpd::import(records, resolver, index),
        Ok(None) => {}
        Err(e) => data.failures.push(e),
    }

    data
}

/// Feed one module's file-metadata stream into the shared fact book.
///
/// Runs for every module before any file-level filtering. A missing stream
/// contributes nothing; a malformed one surfaces as an error the caller
/// records without aborting other modules.
pub fn contribute_file_metadata(
    dir: &Path,
    module_id: &str,
    resolver: &PathResolver,
    book: &FileFactBook,
) -> Result<()> {
    if let Some(records) = load_stream::<records::FileMetadataRecord>(dir, FILE_METADATA_STREAM)? {
        file_metadata::contribute(records, module_id, resolver, book);
    }
    Ok(())
}
