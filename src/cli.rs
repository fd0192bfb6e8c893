//! CLI argument definitions using clap with subcommand architecture
//!
//! Three subcommands cover the three ways the engine is driven: a full
//! reconciliation run, a coverage-only aggregation, and a cache-key pass.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Analyzer report reconciliation engine
#[derive(Parser, Debug)]
#[command(name = "scanmerge")]
#[command(about = "Reconciles analyzer report streams into deduplicated, path-correct views")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (applies to all commands)
    #[arg(short, long, default_value = "text", value_enum, global = true)]
    pub format: OutputFormat,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

// ============================================
// Main Commands Enum
// ============================================

/// Available subcommands for scanmerge
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a full reconciliation: binary streams, issue reports, coverage,
    /// cache keys
    #[command(visible_alias = "r")]
    Run(RunArgs),

    /// Aggregate coverage reports only, without a file index
    #[command(visible_alias = "c")]
    Coverage(CoverageArgs),

    /// Produce incremental cache keys for the indexed files
    CacheKeys(CacheKeysArgs),
}

// ============================================
// Run Subcommand
// ============================================

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the JSON run configuration
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Drop every externally-declared finding regardless of configuration
    #[arg(long)]
    pub no_external_issues: bool,

    /// Treat this run as a pull-request analysis (skips cache keys)
    #[arg(long)]
    pub pull_request: bool,

    /// Base directory cache keys are produced relative to
    #[arg(long, value_name = "DIR", env = "SCANMERGE_BASE_DIR")]
    pub base_dir: Option<PathBuf>,

    /// Disable cache-key production
    #[arg(long)]
    pub no_cache: bool,
}

// ============================================
// Coverage Subcommand
// ============================================

/// Arguments for the coverage command
#[derive(Args, Debug)]
pub struct CoverageArgs {
    /// Path to the JSON run configuration
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}

// ============================================
// Cache-Keys Subcommand
// ============================================

/// Arguments for the cache-keys command
#[derive(Args, Debug)]
pub struct CacheKeysArgs {
    /// Path to the JSON run configuration
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Base directory cache keys are produced relative to
    #[arg(long, value_name = "DIR", env = "SCANMERGE_BASE_DIR")]
    pub base_dir: Option<PathBuf>,
}

// ============================================
// Output Format
// ============================================

/// Output format options
#[derive(Clone, Copy, Debug, Default, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with visual formatting (default for terminal)
    #[default]
    #[value(alias = "pretty")]
    Text,
    /// JSON - standard JSON output for machine parsing
    Json,
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
