//! Symbol reference importer: declaration spans and their usage spans.

use ahash::AHashMap;
use serde::Serialize;

use crate::binary::records::SymbolRecord;
use crate::index::FileIndex;
use crate::location::{normalize_range, TextRange};
use crate::paths::PathResolver;

/// One symbol in a file: where it is declared, where it is referenced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolSpans {
    pub declaration: TextRange,
    pub references: Vec<TextRange>,
}

/// Fold symbol records into per-file symbol tables, first record per file
/// wins. A symbol whose declaration range does not validate is dropped
/// whole; invalid reference spans are dropped individually.
pub fn import(
    records: Vec<SymbolRecord>,
    resolver: &PathResolver,
    index: &dyn FileIndex,
) -> AHashMap<String, Vec<SymbolSpans>> {
    let mut symbols: AHashMap<String, Vec<SymbolSpans>> = AHashMap::new();
    for record in records {
        let canonical = resolver.resolve(&record.file_path);
        let Some(file) = index.lookup(&canonical) else {
            tracing::debug!("Dropping symbol record for unindexed file {}", record.file_path);
            continue;
        };
        if symbols.contains_key(&file.path) {
            tracing::debug!("Ignoring duplicate symbol record for {}", file.path);
            continue;
        }

        let mut table = Vec::with_capacity(record.symbols.len());
        for symbol in record.symbols {
            let Some(declaration) = normalize_range(&file.line_lengths, &symbol.declaration)
            else {
                tracing::debug!(
                    "Dropping symbol with invalid declaration {} in {}",
                    symbol.declaration,
                    file.path
                );
                continue;
            };
            let references = symbol
                .references
                .iter()
                .filter_map(|r| normalize_range(&file.line_lengths, r))
                .collect();
            table.push(SymbolSpans {
                declaration,
                references,
            });
        }
        symbols.insert(file.path.clone(), table);
    }
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::records::SymbolSpan;
    use crate::index::{InMemoryFileIndex, IndexedFile, LineLengths};

    fn index_with(path: &str) -> InMemoryFileIndex {
        let mut index = InMemoryFileIndex::new();
        index.insert(IndexedFile {
            path: path.to_string(),
            module_id: None,
            encoding: Some("UTF-8".to_string()),
            line_lengths: LineLengths::from(vec![30, 30, 30]),
        });
        index
    }

    #[test]
    fn test_declaration_and_references_survive() {
        let index = index_with("/src/A.cs");
        let resolver = PathResolver::new();
        let records = vec![SymbolRecord {
            file_path: "/src/A.cs".to_string(),
            symbols: vec![SymbolSpan {
                declaration: TextRange::new(1, 4, 1, 9),
                references: vec![TextRange::new(2, 0, 2, 5), TextRange::new(3, 0, 3, 5)],
            }],
        }];

        let out = import(records, &resolver, &index);
        let table = &out["/src/A.cs"];
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].references.len(), 2);
    }

    #[test]
    fn test_invalid_declaration_drops_the_symbol() {
        let index = index_with("/src/A.cs");
        let resolver = PathResolver::new();
        let records = vec![SymbolRecord {
            file_path: "/src/A.cs".to_string(),
            symbols: vec![SymbolSpan {
                // Single-line declaration starting at EOL never validates.
                declaration: TextRange::new(1, 30, 1, 30),
                references: vec![TextRange::new(2, 0, 2, 5)],
            }],
        }];

        let out = import(records, &resolver, &index);
        assert!(out["/src/A.cs"].is_empty());
    }

    #[test]
    fn test_invalid_reference_is_dropped_individually() {
        let index = index_with("/src/A.cs");
        let resolver = PathResolver::new();
        let records = vec![SymbolRecord {
            file_path: "/src/A.cs".to_string(),
            symbols: vec![SymbolSpan {
                declaration: TextRange::new(1, 4, 1, 9),
                references: vec![TextRange::new(2, 5, 2, 5), TextRange::new(3, 0, 3, 5)],
            }],
        }];

        let out = import(records, &resolver, &index);
        assert_eq!(out["/src/A.cs"][0].references.len(), 1);
    }
}
