//! Multi-report coverage merge scenarios across the four dialects.

mod common;

use common::ReportTree;
use pretty_assertions::assert_eq;
use scanmerge::cache_keys::CollectingSink;
use scanmerge::config::CoverageReportConfig;
use scanmerge::coverage::{aggregate, CoverageDialect};
use scanmerge::engine;
use scanmerge::paths::PathResolver;
use scanmerge::ScanMergeError;

#[test]
fn test_hits_sum_across_reports_and_dialects() {
    let tree = ReportTree::new();
    let vs = tree.write_coverage_report(
        "unit.coveragexml",
        r#"<results>
  <range source_id="0" covered="yes" start_line="12" end_line="12" />
  <range source_id="0" covered="yes" start_line="12" end_line="12" />
  <source_file id="0" path="/virtual/A.cs" />
</results>"#,
    );
    let ncover = tree.write_coverage_report(
        "integration.nccov",
        r#"<coverage>
  <doc id="1" url="/virtual/A.cs" />
  <seqpnt doc="1" line="12" visitcount="3" />
</coverage>"#,
    );

    let resolver = PathResolver::new();
    let result = aggregate(
        &[
            (vs, CoverageDialect::VisualStudio),
            (ncover, CoverageDialect::Ncover3),
        ],
        &resolver,
    );

    assert!(result.failures.is_empty());
    assert_eq!(result.files.len(), 1);
    assert_eq!(result.files[0].hits[&12], 5, "1 + 1 + 3 across reports");
}

#[test]
fn test_branch_points_union_with_covered_or() {
    let tree = ReportTree::new();
    let first = tree.write_coverage_report(
        "net6.opencover.xml",
        r#"<CoverageSession>
  <File uid="1" fullPath="/virtual/A.cs" />
  <BranchPoint vc="1" sl="12" path="0" fileid="1" />
  <BranchPoint vc="0" sl="12" path="1" fileid="1" />
</CoverageSession>"#,
    );
    let second = tree.write_coverage_report(
        "net8.opencover.xml",
        r#"<CoverageSession>
  <File uid="1" fullPath="/virtual/A.cs" />
  <BranchPoint vc="0" sl="12" path="0" fileid="1" />
  <BranchPoint vc="4" sl="12" path="1" fileid="1" />
</CoverageSession>"#,
    );

    let resolver = PathResolver::new();
    let result = aggregate(
        &[
            (first, CoverageDialect::OpenCover),
            (second, CoverageDialect::OpenCover),
        ],
        &resolver,
    );

    let line = &result.files[0].branches[&12];
    assert_eq!(line.total(), 2, "branch ids union per line");
    assert_eq!(line.covered(), 2, "covered flags OR across reports");
}

#[test]
fn test_malformed_report_names_its_line_and_spares_siblings() {
    let tree = ReportTree::new();
    let bad = tree.write_coverage_report(
        "bad.coveragexml",
        "<results>\n  <source_file id=\"0\" path=\"/virtual/A.cs\" />\n  <range source_id=\"0\" covered=\"maybe\" start_line=\"1\" end_line=\"1\" />\n</results>",
    );
    let good = tree.write_coverage_report(
        "good.nccov",
        r#"<coverage><doc id="1" url="/virtual/B.cs" /><seqpnt doc="1" line="3" visitcount="1" /></coverage>"#,
    );

    let resolver = PathResolver::new();
    let result = aggregate(
        &[
            (bad.clone(), CoverageDialect::VisualStudio),
            (good, CoverageDialect::Ncover3),
        ],
        &resolver,
    );

    assert_eq!(result.failures.len(), 1);
    match &result.failures[0] {
        ScanMergeError::MalformedReport { path, line, message } => {
            assert_eq!(path, &bad);
            assert_eq!(*line, 3, "1-based line of the offending element");
            assert!(message.contains("maybe"), "got: {message}");
        }
        other => panic!("expected MalformedReport, got {other:?}"),
    }
    assert_eq!(result.files.len(), 1, "sibling report still aggregates");
    assert_eq!(result.files[0].hits[&3], 1);
}

#[test]
fn test_dotcover_html_pages_parse() {
    let tree = ReportTree::new();
    let page = tree.write_coverage_report(
        "dotCover.html",
        r#"<html><body>
<script type="text/javascript" data-file-index="0">highlightRanges([[5,1,6,20,1],[8,1,8,9,0]]);</script>
<script type="text/javascript">fileIndex({"0":"/virtual/A.cs"});</script>
</body></html>"#,
    );

    let resolver = PathResolver::new();
    let result = aggregate(&[(page, CoverageDialect::DotCover)], &resolver);

    assert!(result.failures.is_empty());
    let hits = &result.files[0].hits;
    assert_eq!(hits[&5], 1);
    assert_eq!(hits[&6], 1, "multi-line range covers every line in the span");
    assert_eq!(hits[&8], 0, "uncovered ranges still record the line");
}

#[test]
fn test_visual_studio_uncovered_lines_record_zero() {
    let tree = ReportTree::new();
    let report = tree.write_coverage_report(
        "unit.coveragexml",
        r#"<results>
  <source_file id="0" path="/virtual/A.cs" />
  <range source_id="0" covered="no" start_line="14" end_line="15" />
</results>"#,
    );

    let resolver = PathResolver::new();
    let result = aggregate(&[(report, CoverageDialect::VisualStudio)], &resolver);

    let hits = &result.files[0].hits;
    assert_eq!(hits[&14], 0);
    assert_eq!(hits[&15], 0);
}

#[test]
fn test_engine_expands_patterns_and_resolves_paths() {
    let tree = ReportTree::new();
    let src = tree.add_source("A.cs", "line\nline\nline\n");
    tree.write_coverage_report(
        "run.nccov",
        &format!(
            r#"<coverage><doc id="1" url="{src}" /><seqpnt doc="1" line="2" visitcount="7" /></coverage>"#
        ),
    );

    let mut config = tree.config(vec![tree.module_config("core", vec![])]);
    config.coverage_reports = vec![CoverageReportConfig {
        pattern: tree.coverage_pattern("*.nccov"),
        dialect: CoverageDialect::Ncover3,
    }];

    let index = tree.index();
    let mut sink = CollectingSink::default();
    let output = engine::run(&config, &index, &mut sink).unwrap();

    assert_eq!(output.summary.coverage_files, 1);
    assert_eq!(output.coverage[0].path, src, "report path resolved to canonical");
    assert_eq!(output.coverage[0].hits[&2], 7);
}
