//! Cross-module reconciliation of per-file facts.
//!
//! Every module's file-metadata stream contributes "this file is generated"
//! and "this file was detected as charset X" facts. Modules of one solution
//! routinely mention the same physical file under different casings, so the
//! merged view is keyed case-insensitively. Built once per run, before any
//! file-level filtering, and shared by reference with every module import.

use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;
use serde::Serialize;

use crate::encoding::labels_equivalent;
use crate::index::{FileIndex, IndexedFile};

/// Merged facts for one physical file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFact {
    /// First-seen spelling of the URI; lookups fold case, this does not.
    pub uri: String,
    pub generated: bool,
    pub encoding: Option<String>,
}

/// A non-fatal disagreement between modules about a file's encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodingConflict {
    pub uri: String,
    pub kept: String,
    pub reported: String,
    pub module_id: String,
}

#[derive(Default)]
struct BookInner {
    facts: AHashMap<String, FileFact>,
    conflicts: Vec<EncodingConflict>,
}

/// Solution-wide, case-insensitive file-fact map.
///
/// `generated` is a sticky union: once any module reports a URI as
/// generated it stays generated. `encoding` is first-non-null-wins; later
/// modules reporting a genuinely different encoding add to the conflict
/// list and are otherwise ignored. Internally synchronized so concurrent
/// module imports can share one book.
pub struct FileFactBook {
    inner: Mutex<BookInner>,
}

impl FileFactBook {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BookInner::default()),
        }
    }

    /// Merge one module's fact for `uri` into the book.
    pub fn record(&self, uri: &str, generated: bool, encoding: Option<&str>, module_id: &str) {
        let mut inner = self.inner.lock();
        let key = fold_key(uri);
        match inner.facts.get_mut(&key) {
            Some(fact) => {
                fact.generated |= generated;
                match (&fact.encoding, encoding) {
                    (None, Some(reported)) => fact.encoding = Some(reported.to_string()),
                    (Some(kept), Some(reported)) if !labels_equivalent(kept, reported) => {
                        tracing::warn!(
                            "Module {} reports {} as {}, keeping earlier {}",
                            module_id,
                            uri,
                            reported,
                            kept
                        );
                        let conflict = EncodingConflict {
                            uri: fact.uri.clone(),
                            kept: kept.clone(),
                            reported: reported.to_string(),
                            module_id: module_id.to_string(),
                        };
                        inner.conflicts.push(conflict);
                    }
                    _ => {}
                }
            }
            None => {
                inner.facts.insert(
                    key,
                    FileFact {
                        uri: uri.to_string(),
                        generated,
                        encoding: encoding.map(str::to_string),
                    },
                );
            }
        }
    }

    /// Whether any module reported `uri` as generated. False when the URI
    /// was never mentioned.
    pub fn is_generated(&self, uri: &str) -> bool {
        self.inner
            .lock()
            .facts
            .get(&fold_key(uri))
            .map(|f| f.generated)
            .unwrap_or(false)
    }

    /// The winning detected encoding for `uri`, if any module reported one.
    pub fn detected_encoding(&self, uri: &str) -> Option<String> {
        self.inner
            .lock()
            .facts
            .get(&fold_key(uri))
            .and_then(|f| f.encoding.clone())
    }

    /// Snapshot of the merged fact for `uri`.
    pub fn fact(&self, uri: &str) -> Option<FileFact> {
        self.inner.lock().facts.get(&fold_key(uri)).cloned()
    }

    /// All encoding disagreements recorded so far, in observation order.
    pub fn encoding_conflicts(&self) -> Vec<EncodingConflict> {
        self.inner.lock().conflicts.clone()
    }

    /// Whether the toolchain-detected encoding for `uri` agrees with the
    /// host index's encoding. Files that disagree are excluded from
    /// indexing, since line/offset math against the wrong encoding would
    /// be wrong everywhere downstream.
    ///
    /// When the toolchain reported no encoding at all, the answer is
    /// "accept": unknown is not a mismatch.
    pub fn encoding_matches_index(&self, uri: &str, index_encoding: Option<&str>) -> bool {
        let detected = match self.detected_encoding(uri) {
            Some(d) => d,
            None => return true,
        };
        match index_encoding {
            Some(indexed) => labels_equivalent(&detected, indexed),
            None => true,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().facts.is_empty()
    }
}

impl Default for FileFactBook {
    fn default() -> Self {
        Self::new()
    }
}

/// ASCII case folding only: the toolchain's path alphabet is ASCII, and
/// non-ASCII paths must keep comparing exactly.
fn fold_key(uri: &str) -> String {
    uri.to_ascii_lowercase()
}

/// The host index seen through the merged file facts.
///
/// Generated files and files whose toolchain-detected encoding disagrees
/// with the index are excluded here, so every downstream import drops their
/// records without carrying its own exclusion logic. Line/offset math
/// against the wrong encoding would be wrong everywhere, hence the hard
/// exclusion rather than a per-record repair.
pub struct ReconciledIndex<'a> {
    inner: &'a dyn FileIndex,
    book: &'a FileFactBook,
    warned: Mutex<AHashSet<String>>,
}

impl<'a> ReconciledIndex<'a> {
    pub fn new(inner: &'a dyn FileIndex, book: &'a FileFactBook) -> Self {
        Self {
            inner,
            book,
            warned: Mutex::new(AHashSet::new()),
        }
    }
}

impl FileIndex for ReconciledIndex<'_> {
    fn lookup(&self, canonical_path: &str) -> Option<&IndexedFile> {
        let file = self.inner.lookup(canonical_path)?;
        if self.book.is_generated(canonical_path) {
            tracing::debug!("Excluding generated file {}", file.path);
            return None;
        }
        if !self
            .book
            .encoding_matches_index(canonical_path, file.encoding.as_deref())
        {
            if self.warned.lock().insert(fold_key(canonical_path)) {
                tracing::warn!(
                    "Excluding {}: toolchain detected encoding {}, index decoded it as {}",
                    file.path,
                    self.book
                        .detected_encoding(canonical_path)
                        .unwrap_or_default(),
                    file.encoding.as_deref().unwrap_or("unknown")
                );
            }
            return None;
        }
        Some(file)
    }

    fn files(&self) -> Box<dyn Iterator<Item = &IndexedFile> + '_> {
        Box::new(
            self.inner
                .files()
                .filter(move |file| self.lookup(&file.path).is_some()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookups_are_case_insensitive() {
        let book = FileFactBook::new();
        book.record("Foo/Bar.cs", true, Some("UTF-8"), "mod-a");

        assert!(book.is_generated("Foo/Bar.cs"));
        assert!(book.is_generated("foo/bar.cs"));
        assert!(book.is_generated("FOO/BAR.CS"));
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn test_generated_flag_is_sticky() {
        let book = FileFactBook::new();
        book.record("a.cs", true, None, "mod-a");
        book.record("A.CS", false, None, "mod-b");

        assert!(book.is_generated("a.cs"));
    }

    #[test]
    fn test_unreported_file_is_not_generated() {
        let book = FileFactBook::new();
        assert!(!book.is_generated("never/mentioned.cs"));
    }

    #[test]
    fn test_first_non_null_encoding_wins() {
        let book = FileFactBook::new();
        book.record("a.cs", false, None, "mod-a");
        book.record("a.cs", false, Some("UTF-8"), "mod-b");
        book.record("a.cs", false, Some("US-ASCII"), "mod-c");

        assert_eq!(book.detected_encoding("a.cs").as_deref(), Some("UTF-8"));
        let conflicts = book.encoding_conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kept, "UTF-8");
        assert_eq!(conflicts[0].reported, "US-ASCII");
        assert_eq!(conflicts[0].module_id, "mod-c");
    }

    #[test]
    fn test_equivalent_labels_do_not_conflict() {
        let book = FileFactBook::new();
        book.record("a.cs", false, Some("UTF-16"), "mod-a");
        book.record("a.cs", false, Some("UTF-16LE"), "mod-b");

        assert!(book.encoding_conflicts().is_empty());
        assert_eq!(book.detected_encoding("a.cs").as_deref(), Some("UTF-16"));
    }

    #[test]
    fn test_conflict_keeps_first_seen_uri_spelling() {
        let book = FileFactBook::new();
        book.record("Foo/Bar.cs", false, Some("UTF-8"), "mod-a");
        book.record("foo/bar.cs", false, Some("UTF-16"), "mod-b");

        let conflicts = book.encoding_conflicts();
        assert_eq!(conflicts[0].uri, "Foo/Bar.cs");
    }

    #[test]
    fn test_encoding_match_honors_equivalence() {
        let book = FileFactBook::new();
        book.record("a.cs", false, Some("UTF-16"), "mod-a");
        book.record("b.cs", false, Some("UTF-8"), "mod-a");

        assert!(book.encoding_matches_index("a.cs", Some("UTF-16LE")));
        assert!(!book.encoding_matches_index("b.cs", Some("US-ASCII")));
    }

    #[test]
    fn test_missing_detection_is_accepted() {
        let book = FileFactBook::new();
        book.record("a.cs", false, None, "mod-a");

        assert!(book.encoding_matches_index("a.cs", Some("UTF-8")));
        assert!(book.encoding_matches_index("unmentioned.cs", Some("UTF-8")));
    }

    fn index_of(entries: &[(&str, &str)]) -> crate::index::InMemoryFileIndex {
        let mut index = crate::index::InMemoryFileIndex::new();
        for (path, encoding) in entries {
            index.insert(IndexedFile {
                path: path.to_string(),
                module_id: None,
                encoding: Some(encoding.to_string()),
                line_lengths: crate::index::LineLengths::from(vec![10]),
            });
        }
        index
    }

    #[test]
    fn test_reconciled_index_excludes_generated_across_casings() {
        let index = index_of(&[("/src/Form.Designer.cs", "UTF-8")]);
        let book = FileFactBook::new();
        book.record("/SRC/FORM.DESIGNER.CS", true, None, "mod-a");

        let reconciled = ReconciledIndex::new(&index, &book);
        assert!(reconciled.lookup("/src/Form.Designer.cs").is_none());
        assert_eq!(reconciled.files().count(), 0);
    }

    #[test]
    fn test_reconciled_index_excludes_encoding_mismatch() {
        let index = index_of(&[("/src/A.cs", "UTF-8"), ("/src/B.cs", "UTF-8")]);
        let book = FileFactBook::new();
        book.record("/src/A.cs", false, Some("UTF-16BE"), "mod-a");
        book.record("/src/B.cs", false, Some("UTF-8"), "mod-a");

        let reconciled = ReconciledIndex::new(&index, &book);
        assert!(reconciled.lookup("/src/A.cs").is_none());
        assert!(reconciled.lookup("/src/B.cs").is_some());
        assert_eq!(reconciled.files().count(), 1);
    }

    #[test]
    fn test_reconciled_index_accepts_equivalent_labels() {
        let index = index_of(&[("/src/A.cs", "UTF-16LE")]);
        let book = FileFactBook::new();
        book.record("/src/A.cs", false, Some("UTF-16"), "mod-a");

        let reconciled = ReconciledIndex::new(&index, &book);
        assert!(reconciled.lookup("/src/A.cs").is_some());
    }

    #[test]
    fn test_reconciled_index_passes_unmentioned_files_through() {
        let index = index_of(&[("/src/A.cs", "UTF-8")]);
        let book = FileFactBook::new();

        let reconciled = ReconciledIndex::new(&index, &book);
        assert!(reconciled.lookup("/src/A.cs").is_some());
    }
}
