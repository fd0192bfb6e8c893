//! Run orchestration.
//!
//! One run is three ordered passes over the configured modules:
//!
//! 1. A sequential reconcile pass feeds every module's file-metadata stream
//!    into the shared [`FileFactBook`], in module order, so the merged view
//!    does not depend on scheduling.
//! 2. A parallel import pass fans modules out over rayon. Each module
//!    decodes its binary streams and issue reports against the reconciled
//!    index; a shared deduplicator keeps repeated findings out run-wide.
//! 3. A sequential tail aggregates coverage reports, produces cache keys,
//!    and folds per-module results into one output in module order.
//!
//! A rule-table collision aborts before anything is read. Everything else
//! degrades per file or per report: failures are collected, logged, and
//! surfaced in the summary, and the run completes with `success = false`.

use std::time::Instant;

use ahash::AHashMap;
use rayon::prelude::*;
use serde::Serialize;

use crate::binary::{self, cpd::CpdToken, highlights::HighlightSpan, metrics::FileMeasures,
    symbols::SymbolSpans};
use crate::cache_keys::{produce_cache_keys, CachePass, CacheSink};
use crate::config::{ModuleConfig, RunConfig};
use crate::coverage::{self, CoverageFile};
use crate::error::{Result, ScanMergeError};
use crate::index::FileIndex;
use crate::issues::{
    import_report_file, DropCounts, ImportContext, ImportOutcome, IssueDeduplicator,
    PublishedIssue, RuleTable,
};
use crate::paths::PathResolver;
use crate::reconcile::{EncodingConflict, FileFactBook, ReconciledIndex};

/// Everything one module contributed to the run.
#[derive(Default)]
pub struct ModuleImport {
    pub module_id: String,
    pub measures: AHashMap<String, FileMeasures>,
    pub highlights: AHashMap<String, Vec<HighlightSpan>>,
    pub symbols: AHashMap<String, Vec<SymbolSpans>>,
    pub cpd_tokens: AHashMap<String, Vec<CpdToken>>,
    pub issues: Vec<PublishedIssue>,
    pub issue_drops: DropCounts,
    pub span_drops: DropCounts,
    pub failures: Vec<ScanMergeError>,
}

/// Headline numbers of one run, for the CLI and the host.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    /// False when any report or stream failed; the run still completes.
    pub success: bool,
    pub generated_at: String,
    pub duration_ms: u64,
    pub modules: usize,
    pub issues_published: usize,
    pub issues_dropped: DropCounts,
    pub secondary_spans_dropped: DropCounts,
    pub measured_files: usize,
    pub coverage_files: usize,
    pub encoding_conflicts: usize,
    pub cache: CachePass,
    pub report_failures: usize,
}

/// The merged result of one reconciliation run.
#[derive(Debug)]
pub struct RunOutput {
    /// Sorted by anchor (path, line, offset) then rule id.
    pub issues: Vec<PublishedIssue>,
    pub measures: AHashMap<String, FileMeasures>,
    pub highlights: AHashMap<String, Vec<HighlightSpan>>,
    pub symbols: AHashMap<String, Vec<SymbolSpans>>,
    pub cpd_tokens: AHashMap<String, Vec<CpdToken>>,
    pub coverage: Vec<CoverageFile>,
    pub encoding_conflicts: Vec<EncodingConflict>,
    pub failures: Vec<ScanMergeError>,
    pub summary: RunSummary,
}

/// Execute one full reconciliation run against `index`, writing cache keys
/// to `sink`.
///
/// The only hard failure is a rule-id collision in the configuration;
/// per-report and per-stream problems are folded into
/// [`RunOutput::failures`].
pub fn run(config: &RunConfig, index: &dyn FileIndex, sink: &mut dyn CacheSink) -> Result<RunOutput> {
    let started = Instant::now();
    let rules = RuleTable::build(&config.active_rules, &config.rule_categories)?;
    let resolver = PathResolver::new();
    let book = FileFactBook::new();
    let mut failures: Vec<ScanMergeError> = Vec::new();

    // Reconcile pass: file facts from every module, in module order.
    for module in &config.modules {
        for dir in &module.report_dirs {
            if let Err(e) = binary::contribute_file_metadata(dir, &module.id, &resolver, &book) {
                tracing::error!("File metadata for module {} failed: {}", module.id, e);
                failures.push(e);
            }
        }
    }
    tracing::debug!("Reconciled facts for {} files", book.len());

    let reconciled = ReconciledIndex::new(index, &book);
    let dedup = IssueDeduplicator::new();

    let imports: Vec<ModuleImport> = config
        .modules
        .par_iter()
        .map(|module| {
            import_module(
                module,
                &rules,
                &resolver,
                &reconciled,
                &dedup,
                config.import_external_issues,
            )
        })
        .collect();

    let mut output = fold(imports);
    failures.extend(std::mem::take(&mut output.failures));

    let (coverage_reports, expand_failures) = coverage::expand_patterns(&config.coverage_reports);
    failures.extend(expand_failures);
    let coverage = coverage::aggregate(&coverage_reports, &resolver);
    failures.extend(coverage.failures);

    let cache = produce_cache_keys(
        &reconciled,
        config.cache_base(),
        config.pull_request,
        config.cache_enabled,
        sink,
    );

    let encoding_conflicts = book.encoding_conflicts();
    let resolver_stats = resolver.stats();
    tracing::info!(
        "Run complete: {} issues published, {} dropped, {} measured files, {} distinct paths resolved",
        output.issues.len(),
        output.issue_drops.total(),
        output.measures.len(),
        resolver_stats.entries
    );

    let summary = RunSummary {
        success: failures.is_empty(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        duration_ms: started.elapsed().as_millis() as u64,
        modules: config.modules.len(),
        issues_published: output.issues.len(),
        issues_dropped: output.issue_drops,
        secondary_spans_dropped: output.span_drops,
        measured_files: output.measures.len(),
        coverage_files: coverage.files.len(),
        encoding_conflicts: encoding_conflicts.len(),
        cache,
        report_failures: failures.len(),
    };

    Ok(RunOutput {
        issues: output.issues,
        measures: output.measures,
        highlights: output.highlights,
        symbols: output.symbols,
        cpd_tokens: output.cpd_tokens,
        coverage: coverage.files,
        encoding_conflicts,
        failures,
        summary,
    })
}

/// Import one module: binary streams first, then issue reports.
fn import_module(
    module: &ModuleConfig,
    rules: &RuleTable,
    resolver: &PathResolver,
    index: &dyn FileIndex,
    dedup: &IssueDeduplicator,
    import_external: bool,
) -> ModuleImport {
    let mut out = ModuleImport {
        module_id: module.id.clone(),
        ..ModuleImport::default()
    };

    for dir in &module.report_dirs {
        let data = binary::import_module_streams(dir, resolver, index);
        // Multi-targeted builds write one directory per target framework
        // with identical per-file data; the first directory wins.
        for (path, measures) in data.measures {
            out.measures.entry(path).or_insert(measures);
        }
        for (path, spans) in data.highlights {
            out.highlights.entry(path).or_insert(spans);
        }
        for (path, symbols) in data.symbols {
            out.symbols.entry(path).or_insert(symbols);
        }
        for (path, tokens) in data.cpd_tokens {
            out.cpd_tokens.entry(path).or_insert(tokens);
        }
        out.failures.extend(data.failures);
    }

    let ctx = ImportContext {
        module_id: &module.id,
        rules,
        resolver,
        index,
        dedup,
        import_external,
    };
    for report in &module.issue_reports {
        let (outcomes, span_drops) = import_report_file(report, ctx);
        out.span_drops.merge(&span_drops);
        for outcome in outcomes {
            match outcome {
                ImportOutcome::Published(issue) => out.issues.push(issue),
                ImportOutcome::Dropped { reason, .. } => out.issue_drops.bump(reason),
                ImportOutcome::Fatal(e) => {
                    tracing::error!("Issue report for module {} failed: {}", module.id, e);
                    out.failures.push(e);
                }
            }
        }
    }

    out
}

/// Fold per-module imports into one view, in module order. File-keyed maps
/// are first-module-wins; issues concatenate and sort deterministically.
fn fold(imports: Vec<ModuleImport>) -> ModuleImport {
    let mut merged = ModuleImport::default();
    for import in imports {
        for (path, measures) in import.measures {
            merged.measures.entry(path).or_insert(measures);
        }
        for (path, spans) in import.highlights {
            merged.highlights.entry(path).or_insert(spans);
        }
        for (path, symbols) in import.symbols {
            merged.symbols.entry(path).or_insert(symbols);
        }
        for (path, tokens) in import.cpd_tokens {
            merged.cpd_tokens.entry(path).or_insert(tokens);
        }
        merged.issues.extend(import.issues);
        merged.issue_drops.merge(&import.issue_drops);
        merged.span_drops.merge(&import.span_drops);
        merged.failures.extend(import.failures);
    }
    merged.issues.sort_by(|a, b| {
        a.anchor
            .ordering_key()
            .cmp(&b.anchor.ordering_key())
            .then_with(|| a.rule_id.cmp(&b.rule_id))
    });
    merged
}
