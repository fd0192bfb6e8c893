//! scanmerge: analyzer report reconciliation engine
//!
//! Compiler-integrated analyzer toolchains leave behind a pile of report
//! artifacts per module: binary record streams with metrics, syntax
//! highlighting, symbol references and duplication tokens; JSON issue
//! reports; coverage reports in several dialects. This library reconciles
//! those artifacts across the modules of one solution into a single
//! deduplicated, path-correct, encoding-correct view.
//!
//! The pipeline in one paragraph: a [`PathResolver`](paths::PathResolver)
//! maps every reported path onto its canonical on-disk identity; a
//! [`FileFactBook`](reconcile::FileFactBook) merges per-module file facts
//! (generated flags, detected encodings) case-insensitively; the
//! [`ReconciledIndex`](reconcile::ReconciledIndex) filters the host's file
//! index through those facts; module imports decode binary streams and
//! issue reports against that view, with a run-wide deduplicator; coverage
//! reports aggregate additively; and the surviving files get incremental
//! cache keys.
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//!
//! use scanmerge::cache_keys::CollectingSink;
//! use scanmerge::config::RunConfig;
//! use scanmerge::index::InMemoryFileIndex;
//!
//! let config = RunConfig::load(Path::new("reconcile.json"))?;
//! let index = InMemoryFileIndex::from_root(config.solution_root.as_deref().unwrap());
//! let mut sink = CollectingSink::default();
//!
//! let output = scanmerge::engine::run(&config, &index, &mut sink)?;
//! println!("{} issues", output.issues.len());
//! ```

pub mod binary;
pub mod cache_keys;
pub mod cli;
pub mod config;
pub mod coverage;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod hashing;
pub mod index;
pub mod issues;
pub mod location;
pub mod paths;
pub mod reconcile;

// Re-export commonly used types
pub use cli::{Cli, OutputFormat};
pub use engine::{run, RunOutput, RunSummary};
pub use error::{Result, ScanMergeError};
pub use index::{FileIndex, IndexedFile, InMemoryFileIndex, LineLengths};
pub use issues::{
    DropCounts, DropReason, ImportOutcome, IssueAnchor, PublishedIssue, RuleType, Severity,
};
pub use location::{normalize_range, SourceLocation, TextRange};
pub use reconcile::{EncodingConflict, FileFactBook, ReconciledIndex};
