//! Host file-index abstraction.
//!
//! The host that embeds this engine owns file discovery and indexing; the
//! engine only needs to ask "is this canonical path indexed, and what do you
//! know about it". `FileIndex` is that seam. `InMemoryFileIndex` backs the
//! CLI driver and the tests: it walks the analyzed root and records one
//! entry per file with its line-length table.

use std::path::Path;

use ahash::AHashMap;
use ignore::WalkBuilder;

use crate::encoding;

/// Per-line lengths of an indexed file, used to validate and repair
/// analyzer-reported text ranges.
///
/// Lengths count Unicode scalar values per line; line terminators (`\n`,
/// `\r\n`) are excluded, so an offset equal to the length sits exactly at
/// end-of-line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineLengths(Vec<u32>);

impl LineLengths {
    pub fn from_text(text: &str) -> Self {
        let lengths = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).chars().count() as u32)
            .collect();
        Self(lengths)
    }

    /// Length of a 1-based line, if the line exists.
    pub fn get(&self, line: u32) -> Option<u32> {
        if line == 0 {
            return None;
        }
        self.0.get(line as usize - 1).copied()
    }

    /// Number of lines in the file. A trailing newline counts as starting
    /// one more (empty) line, matching how editors and analyzers number.
    pub fn line_count(&self) -> u32 {
        self.0.len() as u32
    }
}

impl From<Vec<u32>> for LineLengths {
    fn from(lengths: Vec<u32>) -> Self {
        Self(lengths)
    }
}

/// What the host index knows about one file.
#[derive(Debug, Clone)]
pub struct IndexedFile {
    /// Canonical absolute path, the identity every report path is resolved to.
    pub path: String,
    /// Module that owns the file, when the host tracks one.
    pub module_id: Option<String>,
    /// The encoding the host decoded the file with.
    pub encoding: Option<String>,
    /// Line-length table for range validation.
    pub line_lengths: LineLengths,
}

/// Lookup interface the engine uses to match report paths against the host.
///
/// `files` exists for the cache-key pass, which hashes every indexed file;
/// everything else goes through point lookups.
pub trait FileIndex: Sync {
    fn lookup(&self, canonical_path: &str) -> Option<&IndexedFile>;

    fn files(&self) -> Box<dyn Iterator<Item = &IndexedFile> + '_>;
}

/// Simple owned index for the CLI driver and tests.
#[derive(Debug, Default)]
pub struct InMemoryFileIndex {
    files: AHashMap<String, IndexedFile>,
}

impl InMemoryFileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: IndexedFile) {
        self.files.insert(file.path.clone(), file);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate indexed files in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexedFile> {
        self.files.values()
    }

    /// Walk `root` and index every non-hidden file, honoring ignore files
    /// the same way the rest of the toolchain does.
    ///
    /// Unreadable files are skipped with a warning; an index is best-effort
    /// by nature since the host may exclude anything.
    pub fn from_root(root: &Path) -> Self {
        let mut index = Self::new();
        for entry in WalkBuilder::new(root).build() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Skipping unwalkable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let path = entry.path();
            let bytes = match std::fs::read(path) {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!("Skipping unreadable file {}: {}", path.display(), e);
                    continue;
                }
            };

            let detected = encoding::sniff_bom(&bytes).map(str::to_string);
            let text = encoding::decode_to_string(&bytes, detected.as_deref());
            let canonical = crate::paths::canonical_string(path);

            index.insert(IndexedFile {
                path: canonical,
                module_id: None,
                encoding: detected.or_else(|| Some("UTF-8".to_string())),
                line_lengths: LineLengths::from_text(&text),
            });
        }
        index
    }
}

impl FileIndex for InMemoryFileIndex {
    fn lookup(&self, canonical_path: &str) -> Option<&IndexedFile> {
        self.files.get(canonical_path)
    }

    fn files(&self) -> Box<dyn Iterator<Item = &IndexedFile> + '_> {
        Box::new(self.files.values())
    }
}
