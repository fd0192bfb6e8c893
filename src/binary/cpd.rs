//! Copy/paste-detection token importer.

use ahash::AHashMap;
use serde::Serialize;

use crate::binary::records::CpdRecord;
use crate::index::FileIndex;
use crate::location::{normalize_range, TextRange};
use crate::paths::PathResolver;

/// One duplication token: its span plus the image the detector hashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CpdToken {
    pub range: TextRange,
    pub image: String,
}

/// Fold CPD records into per-file token streams, first record per file wins.
///
/// Token order is significant to the duplicate detector, so a token whose
/// range does not validate invalidates the whole file's stream rather than
/// leaving a hole in the sequence.
pub fn import(
    records: Vec<CpdRecord>,
    resolver: &PathResolver,
    index: &dyn FileIndex,
) -> AHashMap<String, Vec<CpdToken>> {
    let mut tokens_by_file: AHashMap<String, Vec<CpdToken>> = AHashMap::new();
    for record in records {
        let canonical = resolver.resolve(&record.file_path);
        let Some(file) = index.lookup(&canonical) else {
            tracing::debug!("Dropping CPD record for unindexed file {}", record.file_path);
            continue;
        };
        if tokens_by_file.contains_key(&file.path) {
            tracing::debug!("Ignoring duplicate CPD record for {}", file.path);
            continue;
        }

        let mut tokens = Vec::with_capacity(record.tokens.len());
        let mut intact = true;
        for token in record.tokens {
            match normalize_range(&file.line_lengths, &token.range) {
                Some(range) => tokens.push(CpdToken {
                    range,
                    image: token.image,
                }),
                None => {
                    tracing::warn!(
                        "Skipping CPD stream for {}: token at {} has no valid range",
                        file.path,
                        token.range
                    );
                    intact = false;
                    break;
                }
            }
        }
        if intact {
            tokens_by_file.insert(file.path.clone(), tokens);
        }
    }
    tokens_by_file
}
