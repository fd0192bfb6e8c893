//! File-metadata stream importer: generated flags and detected encodings.
//!
//! Unlike the other streams this one is consumed during the global
//! reconcile pass, before any file-level filtering, so facts survive even
//! for files the host index never materialized.

use crate::binary::records::FileMetadataRecord;
use crate::paths::PathResolver;
use crate::reconcile::FileFactBook;

/// Merge one module's metadata records into the shared fact book.
pub fn contribute(
    records: Vec<FileMetadataRecord>,
    module_id: &str,
    resolver: &PathResolver,
    book: &FileFactBook,
) {
    for record in records {
        let uri = resolver.resolve(&record.file_path);
        book.record(&uri, record.generated, record.encoding.as_deref(), module_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facts_reach_the_book() {
        let book = FileFactBook::new();
        let resolver = PathResolver::new();
        let records = vec![
            FileMetadataRecord {
                file_path: "/src/Gen.cs".to_string(),
                generated: true,
                encoding: Some("UTF-8".to_string()),
            },
            FileMetadataRecord {
                file_path: "/src/Plain.cs".to_string(),
                generated: false,
                encoding: None,
            },
        ];

        contribute(records, "mod-a", &resolver, &book);

        assert!(book.is_generated("/src/Gen.cs"));
        assert!(!book.is_generated("/src/Plain.cs"));
        assert_eq!(book.detected_encoding("/src/Gen.cs").as_deref(), Some("UTF-8"));
    }

    #[test]
    fn test_two_modules_merge_case_insensitively() {
        let book = FileFactBook::new();
        let resolver = PathResolver::new();

        contribute(
            vec![FileMetadataRecord {
                file_path: "/src/Shared.cs".to_string(),
                generated: true,
                encoding: None,
            }],
            "mod-a",
            &resolver,
            &book,
        );
        contribute(
            vec![FileMetadataRecord {
                file_path: "/SRC/SHARED.CS".to_string(),
                generated: false,
                encoding: Some("UTF-8".to_string()),
            }],
            "mod-b",
            &resolver,
            &book,
        );

        assert_eq!(book.len(), 1);
        assert!(book.is_generated("/src/shared.cs"));
        assert_eq!(
            book.detected_encoding("/src/Shared.cs").as_deref(),
            Some("UTF-8")
        );
    }
}
