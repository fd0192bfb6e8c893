//! Issue import: rule routing, scope resolution, dedup, and explicit
//! per-entry outcomes.
//!
//! Every raw report entry resolves to exactly one [`ImportOutcome`].
//! Dropping is normal operation here, not an error path: unresolved files
//! are usually generated code that never reached the host index, and
//! duplicates are multi-target builds replaying the same finding once per
//! target framework. Drops are therefore named outcomes recorded at debug
//! level, while a report file whose mandatory structure cannot be read at
//! all fails as a whole with a single `Fatal` outcome.

use std::path::Path;

use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::ScanMergeError;
use crate::index::{FileIndex, IndexedFile};
use crate::issues::report::{self, IssueReport, RawSecondary, RuleDecl};
use crate::issues::rules::{
    external_severity, severity_from_level, Resolution, RuleTable, RuleType, Severity,
};
use crate::location::{normalize_range, SourceLocation, TextRange};
use crate::paths::PathResolver;

/// Parse progress of one report file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsePhase {
    Unparsed,
    RulesSeen,
    IssuesEmitted,
    Done,
}

/// Why an entry (or a secondary span) did not publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    UnresolvedFile,
    Duplicate,
    InactiveInternalRule,
    ExternalSuppressed,
    EmptyRange,
}

/// Drop tallies per reason.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DropCounts {
    pub unresolved_file: usize,
    pub duplicate: usize,
    pub inactive_internal_rule: usize,
    pub external_suppressed: usize,
    pub empty_range: usize,
}

impl DropCounts {
    pub fn bump(&mut self, reason: DropReason) {
        match reason {
            DropReason::UnresolvedFile => self.unresolved_file += 1,
            DropReason::Duplicate => self.duplicate += 1,
            DropReason::InactiveInternalRule => self.inactive_internal_rule += 1,
            DropReason::ExternalSuppressed => self.external_suppressed += 1,
            DropReason::EmptyRange => self.empty_range += 1,
        }
    }

    pub fn merge(&mut self, other: &DropCounts) {
        self.unresolved_file += other.unresolved_file;
        self.duplicate += other.duplicate;
        self.inactive_internal_rule += other.inactive_internal_rule;
        self.external_suppressed += other.external_suppressed;
        self.empty_range += other.empty_range;
    }

    pub fn total(&self) -> usize {
        self.unresolved_file
            + self.duplicate
            + self.inactive_internal_rule
            + self.external_suppressed
            + self.empty_range
    }
}

/// Where an issue lands after location validation: the most precise
/// granularity that survived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "granularity", rename_all = "snake_case")]
pub enum IssueAnchor {
    /// Project scope, no file involved.
    Module { module_id: String },
    /// The file is known but no sub-range survived.
    File { path: String },
    /// The reported range collapsed, its start line still exists.
    Line { path: String, line: u32 },
    Range { path: String, range: TextRange },
}

impl IssueAnchor {
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Module { .. } => None,
            Self::File { path } | Self::Line { path, .. } | Self::Range { path, .. } => Some(path),
        }
    }

    /// `(scope, line, offset)` tuple for deterministic publication order.
    pub fn ordering_key(&self) -> (&str, u32, u32) {
        match self {
            Self::Module { module_id } => (module_id, 0, 0),
            Self::File { path } => (path, 0, 0),
            Self::Line { path, line } => (path, *line, 0),
            Self::Range { path, range } => (path, range.start_line, range.start_offset),
        }
    }
}

/// A secondary span attached to a published issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecondarySpan {
    pub location: SourceLocation,
    pub message: Option<String>,
}

/// An issue that survived routing, location validation and dedup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedIssue {
    pub rule_id: String,
    /// Owning repository for internal rules; `None` marks an external finding.
    pub repository: Option<String>,
    pub severity: Option<Severity>,
    /// Derived classification, always present on external findings.
    pub rule_type: Option<RuleType>,
    pub message: String,
    pub anchor: IssueAnchor,
    pub secondary: Vec<SecondarySpan>,
}

impl PublishedIssue {
    pub fn is_external(&self) -> bool {
        self.repository.is_none()
    }
}

/// The fate of one raw report entry. `Fatal` stands in for the whole file
/// when it cannot be decoded; no entries were read past the failure point.
#[derive(Debug)]
pub enum ImportOutcome {
    Published(PublishedIssue),
    Dropped { rule_id: String, reason: DropReason },
    Fatal(ScanMergeError),
}

/// Identity of one published issue. The scope id is the owning module for
/// project-level issues, the case-folded canonical path otherwise; the range
/// is the published granularity, not the reported one, so a repaired range
/// and its repaired twin collapse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IssueKey {
    rule_id: String,
    scope_id: String,
    range: Option<TextRange>,
}

impl IssueKey {
    fn new(rule_id: &str, anchor: &IssueAnchor) -> Self {
        let (scope_id, range) = match anchor {
            IssueAnchor::Module { module_id } => (module_id.clone(), None),
            IssueAnchor::File { path } => (path.to_ascii_lowercase(), None),
            IssueAnchor::Line { path, line } => (
                path.to_ascii_lowercase(),
                Some(TextRange::new(*line, 0, *line, 0)),
            ),
            IssueAnchor::Range { path, range } => (path.to_ascii_lowercase(), Some(*range)),
        };
        Self {
            rule_id: rule_id.to_string(),
            scope_id,
            range,
        }
    }
}

/// Run-wide first-seen-wins dedup set, shared by every module import.
#[derive(Default)]
pub struct IssueDeduplicator {
    seen: Mutex<AHashSet<IssueKey>>,
}

impl IssueDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time `key` is offered, false for every replay.
    pub fn first_seen(&self, key: IssueKey) -> bool {
        self.seen.lock().insert(key)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }
}

/// Everything one report import needs from the surrounding run.
#[derive(Clone, Copy)]
pub struct ImportContext<'a> {
    /// Module whose configuration referenced the report file; project-level
    /// issues without an explicit module id attribute to it.
    pub module_id: &'a str,
    pub rules: &'a RuleTable,
    pub resolver: &'a PathResolver,
    pub index: &'a dyn FileIndex,
    pub dedup: &'a IssueDeduplicator,
    pub import_external: bool,
}

enum Route {
    Internal { repository: String },
    External { severity: Severity, rule_type: RuleType },
}

/// State machine over one report file.
pub struct ReportImporter<'a> {
    ctx: ImportContext<'a>,
    phase: ParsePhase,
    declared: AHashMap<String, RuleDecl>,
    span_drops: DropCounts,
}

impl<'a> ReportImporter<'a> {
    pub fn new(ctx: ImportContext<'a>) -> Self {
        Self {
            ctx,
            phase: ParsePhase::Unparsed,
            declared: AHashMap::new(),
            span_drops: DropCounts::default(),
        }
    }

    pub fn phase(&self) -> ParsePhase {
        self.phase
    }

    /// Register the rule dictionary, then classify every issue entry in
    /// report order.
    pub fn import(&mut self, document: IssueReport) -> Vec<ImportOutcome> {
        for rule in document.rules {
            self.declared.insert(rule.id.clone(), rule);
        }
        self.phase = ParsePhase::RulesSeen;

        let outcomes = document
            .issues
            .into_iter()
            .map(|issue| self.classify(issue))
            .collect();
        self.phase = ParsePhase::IssuesEmitted;
        outcomes
    }

    /// Close the import and hand back the secondary-span drop tallies.
    pub fn finish(&mut self) -> DropCounts {
        self.phase = ParsePhase::Done;
        if self.span_drops.total() > 0 {
            tracing::debug!(
                "Dropped {} secondary spans ({} unresolved, {} empty)",
                self.span_drops.total(),
                self.span_drops.unresolved_file,
                self.span_drops.empty_range
            );
        }
        self.span_drops
    }

    fn classify(&mut self, issue: report::RawIssue) -> ImportOutcome {
        let ctx = self.ctx;

        // Instance-level data wins over the rule dictionary's defaults.
        let (level, category) = {
            let decl = self.declared.get(&issue.rule_id);
            (
                issue
                    .level
                    .clone()
                    .or_else(|| decl.and_then(|d| d.default_level.clone())),
                decl.and_then(|d| d.category.clone()),
            )
        };

        let route = match ctx.rules.resolve(&issue.rule_id) {
            Resolution::Internal { repository } => Route::Internal {
                repository: repository.to_string(),
            },
            Resolution::InactiveInternal => {
                return drop_outcome(issue.rule_id, DropReason::InactiveInternalRule);
            }
            Resolution::External => {
                if !ctx.import_external {
                    return drop_outcome(issue.rule_id, DropReason::ExternalSuppressed);
                }
                Route::External {
                    severity: external_severity(level.as_deref()),
                    rule_type: ctx.rules.external_type(category.as_deref(), level.as_deref()),
                }
            }
        };

        let anchor = match &issue.path {
            None => IssueAnchor::Module {
                module_id: issue
                    .module_id
                    .clone()
                    .unwrap_or_else(|| ctx.module_id.to_string()),
            },
            Some(path) => {
                let canonical = ctx.resolver.resolve(path);
                let Some(file) = ctx.index.lookup(&canonical) else {
                    return drop_outcome(issue.rule_id, DropReason::UnresolvedFile);
                };
                match &issue.range {
                    None => IssueAnchor::File {
                        path: file.path.clone(),
                    },
                    Some(raw) => anchor_for_range(file, raw),
                }
            }
        };

        if !ctx.dedup.first_seen(IssueKey::new(&issue.rule_id, &anchor)) {
            return drop_outcome(issue.rule_id, DropReason::Duplicate);
        }

        let secondary = self.collect_secondary(&issue.secondary, anchor.path());

        let (repository, severity, rule_type) = match route {
            Route::Internal { repository } => (
                Some(repository),
                level.as_deref().map(severity_from_level),
                None,
            ),
            Route::External {
                severity,
                rule_type,
            } => (None, Some(severity), Some(rule_type)),
        };

        ImportOutcome::Published(PublishedIssue {
            rule_id: issue.rule_id,
            repository,
            severity,
            rule_type,
            message: issue.message,
            anchor,
            secondary,
        })
    }

    /// Secondary spans are best-effort: order is preserved, anything that
    /// does not resolve to a real non-empty location is dropped. An empty
    /// secondary would only repeat the primary, so there is no file-level
    /// fallback here.
    fn collect_secondary(
        &mut self,
        raws: &[RawSecondary],
        primary_path: Option<&str>,
    ) -> Vec<SecondarySpan> {
        let ctx = self.ctx;
        let mut spans = Vec::new();
        for raw in raws {
            let Some(path) = raw.path.as_deref().or(primary_path) else {
                self.span_drops.bump(DropReason::UnresolvedFile);
                continue;
            };
            let canonical = ctx.resolver.resolve(path);
            let Some(file) = ctx.index.lookup(&canonical) else {
                self.span_drops.bump(DropReason::UnresolvedFile);
                continue;
            };
            let location = match &raw.range {
                None => SourceLocation::file_level(&file.path),
                Some(raw_range) => {
                    match to_text_range(raw_range)
                        .and_then(|candidate| normalize_range(&file.line_lengths, &candidate))
                    {
                        Some(range) => SourceLocation::with_range(&file.path, range),
                        None => {
                            self.span_drops.bump(DropReason::EmptyRange);
                            continue;
                        }
                    }
                }
            };
            spans.push(SecondarySpan {
                location,
                message: raw.message.clone(),
            });
        }
        spans
    }
}

/// Import one report file end to end. A file that cannot be parsed yields a
/// single `Fatal` outcome; the caller moves on to sibling reports.
pub fn import_report_file(path: &Path, ctx: ImportContext<'_>) -> (Vec<ImportOutcome>, DropCounts) {
    match report::parse_report_file(path) {
        Ok(document) => {
            let mut importer = ReportImporter::new(ctx);
            let outcomes = importer.import(document);
            let span_drops = importer.finish();
            (outcomes, span_drops)
        }
        Err(e) => (vec![ImportOutcome::Fatal(e)], DropCounts::default()),
    }
}

fn drop_outcome(rule_id: String, reason: DropReason) -> ImportOutcome {
    tracing::debug!("Dropping issue {}: {:?}", rule_id, reason);
    ImportOutcome::Dropped { rule_id, reason }
}

/// Positions arrive signed; anything that does not fit a `u32` is not a
/// real position.
fn to_text_range(raw: &[i64; 4]) -> Option<TextRange> {
    let as_u32 = |v: i64| u32::try_from(v).ok();
    Some(TextRange::new(
        as_u32(raw[0])?,
        as_u32(raw[1])?,
        as_u32(raw[2])?,
        as_u32(raw[3])?,
    ))
}

/// Range, then line, then file: the most precise granularity that survives.
///
/// When only the range collapses, the reported start line stays
/// authoritative; anchoring any other line would change what the finding
/// points at.
fn anchor_for_range(file: &IndexedFile, raw: &[i64; 4]) -> IssueAnchor {
    if let Some(candidate) = to_text_range(raw) {
        if let Some(range) = normalize_range(&file.line_lengths, &candidate) {
            return IssueAnchor::Range {
                path: file.path.clone(),
                range,
            };
        }
    }
    let start_line = u32::try_from(raw[0])
        .ok()
        .filter(|line| file.line_lengths.get(*line).is_some());
    match start_line {
        Some(line) => IssueAnchor::Line {
            path: file.path.clone(),
            line,
        },
        None => IssueAnchor::File {
            path: file.path.clone(),
        },
    }
}
