//! Metrics stream importer: per-file counters plus the no-sonar line set.

use std::collections::BTreeSet;

use ahash::AHashMap;
use serde::Serialize;

use crate::binary::records::MetricsRecord;
use crate::index::FileIndex;
use crate::paths::PathResolver;

/// Measures for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileMeasures {
    pub lines: u32,
    pub statements: u32,
    pub complexity: u32,
    pub cognitive_complexity: u32,
    /// 1-based lines on which issue reporting is suppressed in-source.
    pub nosonar_lines: BTreeSet<u32>,
}

/// Fold metrics records into a per-file table. The first record per file
/// wins; multi-targeted builds emit one stream per target framework and the
/// counters are identical across targets.
pub fn import(
    records: Vec<MetricsRecord>,
    resolver: &PathResolver,
    index: &dyn FileIndex,
) -> AHashMap<String, FileMeasures> {
    let mut measures = AHashMap::new();
    for record in records {
        let canonical = resolver.resolve(&record.file_path);
        let Some(file) = index.lookup(&canonical) else {
            tracing::debug!("Dropping metrics record for unindexed file {}", record.file_path);
            continue;
        };
        if measures.contains_key(&file.path) {
            tracing::debug!("Ignoring duplicate metrics record for {}", file.path);
            continue;
        }
        measures.insert(
            file.path.clone(),
            FileMeasures {
                lines: record.lines,
                statements: record.statements,
                complexity: record.complexity,
                cognitive_complexity: record.cognitive_complexity,
                nosonar_lines: record.nosonar_lines.into_iter().collect(),
            },
        );
    }
    measures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{InMemoryFileIndex, IndexedFile, LineLengths};

    fn index_with(path: &str) -> InMemoryFileIndex {
        let mut index = InMemoryFileIndex::new();
        index.insert(IndexedFile {
            path: path.to_string(),
            module_id: None,
            encoding: Some("UTF-8".to_string()),
            line_lengths: LineLengths::from(vec![10, 10, 10]),
        });
        index
    }

    fn record(path: &str, lines: u32) -> MetricsRecord {
        MetricsRecord {
            file_path: path.to_string(),
            lines,
            statements: 4,
            complexity: 2,
            cognitive_complexity: 1,
            nosonar_lines: vec![3, 1, 3],
        }
    }

    #[test]
    fn test_measures_land_under_the_indexed_path() {
        let index = index_with("/src/A.cs");
        let resolver = PathResolver::new();

        let out = import(vec![record("/src/A.cs", 3)], &resolver, &index);
        let m = &out["/src/A.cs"];
        assert_eq!(m.lines, 3);
        assert_eq!(m.statements, 4);
        assert_eq!(m.nosonar_lines, BTreeSet::from([1, 3]));
    }

    #[test]
    fn test_first_record_wins_for_multi_target_streams() {
        let index = index_with("/src/A.cs");
        let resolver = PathResolver::new();

        let out = import(
            vec![record("/src/A.cs", 3), record("/src/A.cs", 99)],
            &resolver,
            &index,
        );
        assert_eq!(out["/src/A.cs"].lines, 3);
    }

    #[test]
    fn test_unindexed_file_is_dropped() {
        let index = index_with("/src/A.cs");
        let resolver = PathResolver::new();

        let out = import(vec![record("/src/Other.cs", 3)], &resolver, &index);
        assert!(out.is_empty());
    }
}
