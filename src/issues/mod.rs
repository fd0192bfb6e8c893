//! Diagnostic-report import.
//!
//! Analyzer toolchains emit one JSON issue report per module (or one
//! aggregated document for the whole build): a rule dictionary followed by
//! an issue list. This module turns those documents into published issues:
//!
//! - [`report`]: the serde model and file-level parsing
//! - [`rules`]: active-rule resolution and external-finding classification
//! - [`import`]: scope resolution, range repair, dedup, and per-entry
//!   outcomes
//!
//! Rule attribution is all-or-nothing: a bare rule id claimed by two
//! repositories aborts the run before any entry is read. Everything else
//! degrades per entry or per file.

pub mod import;
pub mod report;
pub mod rules;

pub use import::{
    import_report_file, DropCounts, DropReason, ImportContext, ImportOutcome, IssueAnchor,
    IssueDeduplicator, ParsePhase, PublishedIssue, ReportImporter, SecondarySpan,
};
pub use report::{parse_report_file, IssueReport, RawIssue, RawSecondary, RuleDecl};
pub use rules::{
    external_severity, severity_from_level, ActiveRule, Resolution, RuleTable, RuleType, Severity,
};
