//! End-to-end issue import scenarios through the engine.

mod common;

use common::ReportTree;
use scanmerge::cache_keys::{CachePass, CollectingSink, SkipReason};
use scanmerge::config::RunConfig;
use scanmerge::engine::{self, RunOutput};
use scanmerge::hashing;
use scanmerge::issues::ActiveRule;
use scanmerge::{IssueAnchor, RuleType, ScanMergeError, Severity, TextRange};

fn active(repository: &str, rule_id: &str) -> ActiveRule {
    ActiveRule {
        repository: repository.to_string(),
        rule_id: rule_id.to_string(),
    }
}

fn run_tree(tree: &ReportTree, config: &RunConfig) -> (RunOutput, CollectingSink) {
    let index = tree.index();
    let mut sink = CollectingSink::default();
    let output = engine::run(config, &index, &mut sink).expect("run should succeed");
    (output, sink)
}

const TEN_CHAR_LINES: &str = "0123456789\n0123456789\n0123456789\n";

#[test]
fn test_same_finding_across_reports_publishes_once() {
    let tree = ReportTree::new();
    let src = tree.add_source("A.cs", TEN_CHAR_LINES);
    let report = serde_json::json!({
        "rules": [{ "id": "S100", "defaultLevel": "warning" }],
        "issues": [{
            "ruleId": "S100",
            "message": "Rename this method",
            "path": src.as_str(),
            "range": [1, 0, 1, 5]
        }]
    })
    .to_string();
    let net6 = tree.write_issue_report("core", "issues-net6.json", &report);
    let net8 = tree.write_issue_report("core", "issues-net8.json", &report);

    let mut config = tree.config(vec![tree.module_config("core", vec![net6, net8])]);
    config.active_rules = vec![active("csharpsquid", "S100")];

    let (output, _) = run_tree(&tree, &config);

    assert_eq!(output.issues.len(), 1);
    assert_eq!(output.summary.issues_dropped.duplicate, 1);
    let issue = &output.issues[0];
    assert_eq!(issue.repository.as_deref(), Some("csharpsquid"));
    assert_eq!(issue.severity, Some(Severity::Major), "declared default level");
    assert_eq!(issue.rule_type, None, "internal issues carry no derived type");
}

#[test]
fn test_rule_id_collision_aborts_naming_both_repositories() {
    let tree = ReportTree::new();
    let mut config = tree.config(vec![tree.module_config("core", vec![])]);
    config.active_rules = vec![active("csharpsquid", "S100"), active("securityscan", "S100")];

    let index = tree.index();
    let mut sink = CollectingSink::default();
    let err = engine::run(&config, &index, &mut sink).unwrap_err();

    match err {
        ScanMergeError::RuleIdCollision { rule, first, second } => {
            assert_eq!(rule, "S100");
            let mut repos = [first, second];
            repos.sort();
            assert_eq!(repos, ["csharpsquid".to_string(), "securityscan".to_string()]);
        }
        other => panic!("expected RuleIdCollision, got {other:?}"),
    }
}

#[test]
fn test_issue_on_unindexed_path_drops() {
    let tree = ReportTree::new();
    tree.add_source("A.cs", TEN_CHAR_LINES);
    let report = serde_json::json!({
        "issues": [{
            "ruleId": "S100",
            "message": "Phantom file",
            "path": "/somewhere/else/Z.cs"
        }]
    })
    .to_string();
    let report = tree.write_issue_report("core", "issues.json", &report);

    let mut config = tree.config(vec![tree.module_config("core", vec![report])]);
    config.active_rules = vec![active("csharpsquid", "S100")];

    let (output, _) = run_tree(&tree, &config);

    assert!(output.issues.is_empty());
    assert_eq!(output.summary.issues_dropped.unresolved_file, 1);
    assert!(output.summary.success, "drops are not failures");
}

#[test]
fn test_defective_ranges_degrade_to_line_then_file() {
    let tree = ReportTree::new();
    let src = tree.add_source("A.cs", TEN_CHAR_LINES);
    let report = serde_json::json!({
        "issues": [
            { "ruleId": "S100", "message": "valid", "path": src.as_str(),
              "range": [2, 3, 2, 7] },
            { "ruleId": "S200", "message": "start past EOL", "path": src.as_str(),
              "range": [2, 50, 2, 60] },
            { "ruleId": "S300", "message": "line past EOF", "path": src.as_str(),
              "range": [99, 0, 99, 4] },
            { "ruleId": "S400", "message": "negative", "path": src.as_str(),
              "range": [-1, 0, 2, 3] }
        ]
    })
    .to_string();
    let report = tree.write_issue_report("core", "issues.json", &report);

    let mut config = tree.config(vec![tree.module_config("core", vec![report])]);
    config.active_rules = vec![
        active("csharpsquid", "S100"),
        active("csharpsquid", "S200"),
        active("csharpsquid", "S300"),
        active("csharpsquid", "S400"),
    ];

    let (output, _) = run_tree(&tree, &config);
    assert_eq!(output.issues.len(), 4, "degradation never drops the issue");

    let anchor_of = |rule: &str| {
        output
            .issues
            .iter()
            .find(|i| i.rule_id == rule)
            .map(|i| i.anchor.clone())
            .unwrap()
    };
    assert_eq!(
        anchor_of("S100"),
        IssueAnchor::Range {
            path: src.clone(),
            range: TextRange::new(2, 3, 2, 7)
        }
    );
    assert_eq!(
        anchor_of("S200"),
        IssueAnchor::Line {
            path: src.clone(),
            line: 2
        },
        "reported start line survives even when the range does not"
    );
    assert_eq!(anchor_of("S300"), IssueAnchor::File { path: src.clone() });
    assert_eq!(anchor_of("S400"), IssueAnchor::File { path: src.clone() });
}

#[test]
fn test_overshooting_end_clamps_to_eof() {
    let tree = ReportTree::new();
    let src = tree.add_source("A.cs", TEN_CHAR_LINES);
    let report = serde_json::json!({
        "issues": [{
            "ruleId": "S100", "message": "spans whole file",
            "path": src.as_str(), "range": [1, 0, 99, 50]
        }]
    })
    .to_string();
    let report = tree.write_issue_report("core", "issues.json", &report);

    let mut config = tree.config(vec![tree.module_config("core", vec![report])]);
    config.active_rules = vec![active("csharpsquid", "S100")];

    let (output, _) = run_tree(&tree, &config);

    // Trailing newline opens an empty fourth line; the end clamps to its EOL.
    assert_eq!(
        output.issues[0].anchor,
        IssueAnchor::Range {
            path: src,
            range: TextRange::new(1, 0, 4, 0)
        }
    );
}

#[test]
fn test_external_findings_classified_from_category_and_level() {
    let tree = ReportTree::new();
    let src = tree.add_source("A.cs", TEN_CHAR_LINES);
    let report = serde_json::json!({
        "rules": [
            { "id": "CA2100", "category": "Security" },
            { "id": "CA1822", "defaultLevel": "warning" },
            { "id": "NU1701" }
        ],
        "issues": [
            { "ruleId": "CA2100", "level": "error", "message": "sql injection",
              "path": src.as_str() },
            { "ruleId": "CA1822", "message": "mark member static", "path": src.as_str() },
            { "ruleId": "NU1701", "level": "error", "message": "package restored",
              "path": src.as_str() }
        ]
    })
    .to_string();
    let report = tree.write_issue_report("core", "issues.json", &report);

    let mut config = tree.config(vec![tree.module_config("core", vec![report])]);
    config
        .rule_categories
        .insert("Security".to_string(), RuleType::Vulnerability);

    let (output, _) = run_tree(&tree, &config);
    assert_eq!(output.issues.len(), 3);

    let by_rule = |rule: &str| output.issues.iter().find(|i| i.rule_id == rule).unwrap();

    let sql = by_rule("CA2100");
    assert!(sql.is_external());
    assert_eq!(sql.severity, Some(Severity::Critical));
    assert_eq!(sql.rule_type, Some(RuleType::Vulnerability));

    let member = by_rule("CA1822");
    assert_eq!(member.severity, Some(Severity::Major), "declared default level");
    assert_eq!(member.rule_type, Some(RuleType::CodeSmell));

    let package = by_rule("NU1701");
    assert_eq!(
        package.rule_type,
        Some(RuleType::Bug),
        "error level without category means bug"
    );
}

#[test]
fn test_external_import_toggle_suppresses() {
    let tree = ReportTree::new();
    let src = tree.add_source("A.cs", TEN_CHAR_LINES);
    let report = serde_json::json!({
        "issues": [
            { "ruleId": "CA1000", "level": "warning", "message": "external",
              "path": src.as_str() },
            { "ruleId": "S100", "level": "warning", "message": "internal",
              "path": src.as_str() }
        ]
    })
    .to_string();
    let report = tree.write_issue_report("core", "issues.json", &report);

    let mut config = tree.config(vec![tree.module_config("core", vec![report])]);
    config.active_rules = vec![active("csharpsquid", "S100")];
    config.import_external_issues = false;

    let (output, _) = run_tree(&tree, &config);

    assert_eq!(output.issues.len(), 1);
    assert_eq!(output.issues[0].rule_id, "S100");
    assert_eq!(output.summary.issues_dropped.external_suppressed, 1);
}

#[test]
fn test_inactive_internal_rule_never_surfaces_as_external() {
    let tree = ReportTree::new();
    let src = tree.add_source("A.cs", TEN_CHAR_LINES);
    let report = serde_json::json!({
        "issues": [
            { "ruleId": "S1234", "level": "warning", "message": "internal shape, inactive",
              "path": src.as_str() },
            { "ruleId": "CA1000", "level": "warning", "message": "genuinely external",
              "path": src.as_str() }
        ]
    })
    .to_string();
    let report = tree.write_issue_report("core", "issues.json", &report);

    let config = tree.config(vec![tree.module_config("core", vec![report])]);

    let (output, _) = run_tree(&tree, &config);

    assert_eq!(output.issues.len(), 1);
    assert_eq!(output.issues[0].rule_id, "CA1000");
    assert!(output.issues[0].is_external());
    assert_eq!(output.summary.issues_dropped.inactive_internal_rule, 1);
}

#[test]
fn test_missing_streams_do_not_fail_the_run() {
    let tree = ReportTree::new();
    tree.add_source("A.cs", TEN_CHAR_LINES);
    // Report directory exists but holds no streams at all.
    let config = tree.config(vec![tree.module_config("core", vec![])]);

    let (output, _) = run_tree(&tree, &config);

    assert!(output.summary.success);
    assert!(output.failures.is_empty());
    assert!(output.measures.is_empty());
}

#[test]
fn test_malformed_issue_report_fails_alone() {
    let tree = ReportTree::new();
    let src = tree.add_source("A.cs", TEN_CHAR_LINES);
    let bad = tree.write_issue_report("core", "broken.json", "{ this is not json");
    let good_report = serde_json::json!({
        "issues": [{ "ruleId": "CA1000", "level": "warning", "message": "still here",
                     "path": src.as_str() }]
    })
    .to_string();
    let good = tree.write_issue_report("core", "good.json", &good_report);

    let config = tree.config(vec![tree.module_config("core", vec![bad, good])]);

    let (output, _) = run_tree(&tree, &config);

    assert!(!output.summary.success);
    assert_eq!(output.failures.len(), 1);
    assert!(matches!(
        output.failures[0],
        ScanMergeError::MalformedReport { .. }
    ));
    assert_eq!(output.issues.len(), 1, "sibling report still imports");
}

#[test]
fn test_project_scoped_issues_land_on_modules() {
    let tree = ReportTree::new();
    tree.add_source("A.cs", TEN_CHAR_LINES);
    let report = serde_json::json!({
        "issues": [
            { "ruleId": "S100", "level": "warning", "message": "project scope" },
            { "ruleId": "S100", "level": "warning", "message": "explicit module",
              "moduleId": "App.Tests" }
        ]
    })
    .to_string();
    let report = tree.write_issue_report("core", "issues.json", &report);

    let mut config = tree.config(vec![tree.module_config("core", vec![report])]);
    config.active_rules = vec![active("csharpsquid", "S100")];

    let (output, _) = run_tree(&tree, &config);

    assert_eq!(output.issues.len(), 2, "different modules, different identities");
    let modules: Vec<_> = output
        .issues
        .iter()
        .map(|i| match &i.anchor {
            IssueAnchor::Module { module_id } => module_id.as_str(),
            other => panic!("expected module anchor, got {other:?}"),
        })
        .collect();
    assert!(modules.contains(&"core"), "defaults to the importing module");
    assert!(modules.contains(&"App.Tests"));
}

#[test]
fn test_pull_request_run_skips_cache_keys() {
    let tree = ReportTree::new();
    tree.add_source("A.cs", TEN_CHAR_LINES);
    let mut config = tree.config(vec![tree.module_config("core", vec![])]);
    config.pull_request = true;

    let (output, sink) = run_tree(&tree, &config);

    assert_eq!(
        output.summary.cache,
        CachePass::Skipped {
            reason: SkipReason::PullRequest
        }
    );
    assert!(sink.entries.is_empty());
}

#[test]
fn test_cache_keys_hash_indexed_content() {
    let tree = ReportTree::new();
    tree.add_source("Services/Billing.cs", "class Billing {}");
    let config = tree.config(vec![tree.module_config("core", vec![])]);

    let (output, sink) = run_tree(&tree, &config);

    assert_eq!(output.summary.cache, CachePass::Completed { written: 1, failed: 0 });
    let (path, digest) = &sink.entries[0];
    assert_eq!(path, "Services/Billing.cs", "base-relative with forward slashes");
    assert_eq!(*digest, hashing::hash_bytes(b"class Billing {}"));
}
