//! Syntax-highlighting span importer.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::binary::records::HighlightRecord;
use crate::index::FileIndex;
use crate::location::{normalize_range, TextRange};
use crate::paths::PathResolver;

/// Token classification as the toolchain reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Unknown,
    Keyword,
    TypeName,
    NumericLiteral,
    StringLiteral,
    Comment,
    PreprocessorDirective,
}

/// One classified span in a file, range already validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HighlightSpan {
    pub range: TextRange,
    pub kind: TokenKind,
}

/// Fold highlight records into per-file span lists. The first record per
/// file wins (multi-targeted builds replay the same file once per target);
/// spans that do not survive range validation are dropped individually.
pub fn import(
    records: Vec<HighlightRecord>,
    resolver: &PathResolver,
    index: &dyn FileIndex,
) -> AHashMap<String, Vec<HighlightSpan>> {
    let mut highlights: AHashMap<String, Vec<HighlightSpan>> = AHashMap::new();
    for record in records {
        let canonical = resolver.resolve(&record.file_path);
        let Some(file) = index.lookup(&canonical) else {
            tracing::debug!("Dropping highlight record for unindexed file {}", record.file_path);
            continue;
        };
        if highlights.contains_key(&file.path) {
            tracing::debug!("Ignoring duplicate highlight record for {}", file.path);
            continue;
        }

        let mut spans = Vec::with_capacity(record.tokens.len());
        for token in record.tokens {
            match normalize_range(&file.line_lengths, &token.range) {
                Some(range) => spans.push(HighlightSpan {
                    range,
                    kind: token.kind,
                }),
                None => {
                    tracing::debug!(
                        "Dropping highlight span {} in {}: no valid range",
                        token.range,
                        file.path
                    );
                }
            }
        }
        highlights.insert(file.path.clone(), spans);
    }
    highlights
}
