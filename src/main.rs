//! scanmerge CLI entry point

use std::process::ExitCode;

use scanmerge::binary;
use scanmerge::cache_keys::{produce_cache_keys, CachePass, CollectingSink, SkipReason};
use scanmerge::cli::{CacheKeysArgs, Cli, Commands, CoverageArgs, OutputFormat, RunArgs};
use scanmerge::config::RunConfig;
use scanmerge::coverage::{self, CoverageAggregation, CoverageFile};
use scanmerge::engine::{self, RunOutput};
use scanmerge::hashing;
use scanmerge::index::InMemoryFileIndex;
use scanmerge::issues::IssueAnchor;
use scanmerge::paths::PathResolver;
use scanmerge::reconcile::{FileFactBook, ReconciledIndex};
use scanmerge::ScanMergeError;

fn main() -> ExitCode {
    match run() {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn run() -> scanmerge::Result<String> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Run(args) => run_reconcile(&cli, args),
        Commands::Coverage(args) => run_coverage(&cli, args),
        Commands::CacheKeys(args) => run_cache_keys(&cli, args),
    }
}

/// Initialize tracing to stderr; stdout is reserved for command output.
/// May fail if already initialized, which is fine.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "scanmerge=debug"
    } else {
        "scanmerge=info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run a full reconciliation
fn run_reconcile(cli: &Cli, args: &RunArgs) -> scanmerge::Result<String> {
    let mut config = RunConfig::load(&args.config)?;

    // CLI flags override file values.
    if args.no_external_issues {
        config.import_external_issues = false;
    }
    if args.pull_request {
        config.pull_request = true;
    }
    if args.no_cache {
        config.cache_enabled = false;
    }
    if let Some(base) = &args.base_dir {
        config.cache_base_dir = Some(base.clone());
    }

    let Some(root) = config.solution_root.as_deref() else {
        return Err(ScanMergeError::InvalidConfig {
            path: args.config.clone(),
            message: "solutionRoot is required to build the file index".to_string(),
        });
    };

    if cli.verbose {
        eprintln!("Indexing {}", root.display());
    }
    let index = InMemoryFileIndex::from_root(root);
    if cli.verbose {
        eprintln!("Indexed {} files", index.len());
    }

    let mut sink = CollectingSink::default();
    let output = engine::run(&config, &index, &mut sink)?;

    match cli.format {
        OutputFormat::Text => Ok(format_run_text(&output)),
        OutputFormat::Json => Ok(format_run_json(&output, &sink)),
    }
}

/// Aggregate coverage reports without building a file index
fn run_coverage(cli: &Cli, args: &CoverageArgs) -> scanmerge::Result<String> {
    let config = RunConfig::load(&args.config)?;
    let resolver = PathResolver::new();

    let (reports, mut failures) = coverage::expand_patterns(&config.coverage_reports);
    if cli.verbose {
        eprintln!("Aggregating {} coverage reports", reports.len());
    }
    let CoverageAggregation {
        files,
        failures: parse_failures,
    } = coverage::aggregate(&reports, &resolver);
    failures.extend(parse_failures);

    match cli.format {
        OutputFormat::Text => {
            let mut out = String::new();
            out.push_str("═══════════════════════════════════════════════════════\n");
            out.push_str(&format!(
                "  COVERAGE: {} files from {} reports\n",
                files.len(),
                reports.len()
            ));
            out.push_str("═══════════════════════════════════════════════════════\n\n");
            for file in &files {
                out.push_str(&coverage_line(file));
            }
            push_failures(&mut out, &failures);
            Ok(out)
        }
        OutputFormat::Json => {
            let value = serde_json::json!({
                "files": files,
                "failures": failure_strings(&failures),
            });
            Ok(format!("{:#}\n", value))
        }
    }
}

/// Produce cache keys for the reconciled file index
fn run_cache_keys(cli: &Cli, args: &CacheKeysArgs) -> scanmerge::Result<String> {
    let mut config = RunConfig::load(&args.config)?;
    if let Some(base) = &args.base_dir {
        config.cache_base_dir = Some(base.clone());
    }

    let Some(root) = config.solution_root.as_deref() else {
        return Err(ScanMergeError::InvalidConfig {
            path: args.config.clone(),
            message: "solutionRoot is required to build the file index".to_string(),
        });
    };
    let index = InMemoryFileIndex::from_root(root);
    if cli.verbose {
        eprintln!("Indexed {} files under {}", index.len(), root.display());
    }

    // Generated and encoding-mismatched files must not receive cache keys,
    // so the metadata reconcile pass runs here too.
    let resolver = PathResolver::new();
    let book = FileFactBook::new();
    for module in &config.modules {
        for dir in &module.report_dirs {
            if let Err(e) = binary::contribute_file_metadata(dir, &module.id, &resolver, &book) {
                tracing::error!("File metadata for module {} failed: {}", module.id, e);
            }
        }
    }
    let reconciled = ReconciledIndex::new(&index, &book);

    let mut sink = CollectingSink::default();
    let pass = produce_cache_keys(
        &reconciled,
        config.cache_base(),
        config.pull_request,
        config.cache_enabled,
        &mut sink,
    );
    sink.entries.sort_by(|a, b| a.0.cmp(&b.0));

    match cli.format {
        OutputFormat::Text => {
            let mut out = String::new();
            match pass {
                CachePass::Skipped { reason } => {
                    out.push_str(&format!("cache keys skipped: {}\n", skip_reason(reason)));
                }
                CachePass::Completed { written, failed } => {
                    for (path, digest) in &sink.entries {
                        out.push_str(&format!("{}  {}\n", hashing::to_hex(digest), path));
                    }
                    out.push_str(&format!("{} keys written, {} failed\n", written, failed));
                }
            }
            Ok(out)
        }
        OutputFormat::Json => {
            let keys: Vec<_> = sink
                .entries
                .iter()
                .map(|(path, digest)| {
                    serde_json::json!({ "path": path, "digest": hashing::to_hex(digest) })
                })
                .collect();
            let value = serde_json::json!({ "pass": pass, "keys": keys });
            Ok(format!("{:#}\n", value))
        }
    }
}

// ============================================
// Output formatting
// ============================================

fn format_run_text(output: &RunOutput) -> String {
    let summary = &output.summary;
    let mut out = String::new();

    out.push_str("═══════════════════════════════════════════════════════\n");
    out.push_str(&format!(
        "  RECONCILIATION: {} modules, {} issues\n",
        summary.modules, summary.issues_published
    ));
    out.push_str("═══════════════════════════════════════════════════════\n\n");

    for issue in &output.issues {
        let severity = issue.severity.map(|s| s.as_str()).unwrap_or("-");
        let origin = issue.repository.as_deref().unwrap_or("external");
        out.push_str(&format!(
            "  {} {} [{}] {}: {}\n",
            anchor_display(&issue.anchor),
            issue.rule_id,
            severity,
            origin,
            issue.message
        ));
    }
    if !output.issues.is_empty() {
        out.push('\n');
    }

    out.push_str(&format!(
        "issues: {} published, {} dropped, {} secondary spans dropped\n",
        summary.issues_published,
        summary.issues_dropped.total(),
        summary.secondary_spans_dropped.total()
    ));
    out.push_str(&format!(
        "measures: {} files, highlights: {} files, symbols: {} files, cpd: {} files\n",
        output.measures.len(),
        output.highlights.len(),
        output.symbols.len(),
        output.cpd_tokens.len()
    ));
    out.push_str(&format!(
        "coverage: {} files, encoding conflicts: {}\n",
        summary.coverage_files, summary.encoding_conflicts
    ));
    match summary.cache {
        CachePass::Skipped { reason } => {
            out.push_str(&format!("cache: skipped ({})\n", skip_reason(reason)));
        }
        CachePass::Completed { written, failed } => {
            out.push_str(&format!("cache: {} keys written, {} failed\n", written, failed));
        }
    }
    push_failures(&mut out, &output.failures);
    out.push_str(&format!(
        "result: {} in {} ms\n",
        if summary.success { "ok" } else { "completed with failures" },
        summary.duration_ms
    ));

    out
}

fn format_run_json(output: &RunOutput, sink: &CollectingSink) -> String {
    let cache_keys: Vec<_> = sink
        .entries
        .iter()
        .map(|(path, digest)| {
            serde_json::json!({ "path": path, "digest": hashing::to_hex(digest) })
        })
        .collect();
    let value = serde_json::json!({
        "summary": output.summary,
        "issues": output.issues,
        "measures": output.measures,
        "highlights": output.highlights,
        "symbols": output.symbols,
        "cpdTokens": output.cpd_tokens,
        "coverage": output.coverage,
        "encodingConflicts": output.encoding_conflicts,
        "cacheKeys": cache_keys,
        "failures": failure_strings(&output.failures),
    });
    format!("{:#}\n", value)
}

fn anchor_display(anchor: &IssueAnchor) -> String {
    match anchor {
        IssueAnchor::Module { module_id } => format!("[{}]", module_id),
        IssueAnchor::File { path } => path.clone(),
        IssueAnchor::Line { path, line } => format!("{}:{}", path, line),
        IssueAnchor::Range { path, range } => {
            format!("{}:{}:{}", path, range.start_line, range.start_offset)
        }
    }
}

fn coverage_line(file: &CoverageFile) -> String {
    let hit = file.hits.values().filter(|h| **h > 0).count();
    let (covered, total) = file
        .branches
        .values()
        .fold((0u32, 0u32), |(c, t), line| (c + line.covered(), t + line.total()));
    if total > 0 {
        format!(
            "  {}: {}/{} lines hit, {}/{} branches\n",
            file.path,
            hit,
            file.hits.len(),
            covered,
            total
        )
    } else {
        format!("  {}: {}/{} lines hit\n", file.path, hit, file.hits.len())
    }
}

fn skip_reason(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::PullRequest => "pull request analysis",
        SkipReason::CachingDisabled => "caching disabled",
        SkipReason::NoBasePath => "no base path",
    }
}

fn failure_strings(failures: &[ScanMergeError]) -> Vec<String> {
    failures.iter().map(|e| e.to_string()).collect()
}

fn push_failures(out: &mut String, failures: &[ScanMergeError]) {
    if failures.is_empty() {
        return;
    }
    out.push_str(&format!("failures: {}\n", failures.len()));
    for failure in failures {
        out.push_str(&format!("  - {}\n", failure));
    }
}
