//! Coverage report aggregation across dialects and build targets.
//!
//! Four report dialects, dispatched by configuration rather than content
//! sniffing. The same source file routinely shows up in several reports
//! (one per target framework, sometimes one per dialect), so merging is
//! additive: per-line hit counts are summed and branch points unioned by
//! branch id with covered flags OR-ed. Over-reporting a little when target
//! frameworks disagree about branch sets beats losing signal.
//!
//! A report that cannot be parsed fails alone, with the 1-based source line
//! of the offending construct; sibling reports still aggregate.

pub mod dotcover;
pub mod ncover;
pub mod opencover;
pub mod visual_studio;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ahash::AHashMap;
use quick_xml::events::BytesStart;
use serde::{Deserialize, Serialize};

use crate::config::CoverageReportConfig;
use crate::error::{Result, ScanMergeError};
use crate::paths::PathResolver;

/// The closed set of supported report dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageDialect {
    VisualStudio,
    Ncover3,
    OpenCover,
    DotCover,
}

impl CoverageDialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VisualStudio => "visual_studio",
            Self::Ncover3 => "ncover3",
            Self::OpenCover => "open_cover",
            Self::DotCover => "dot_cover",
        }
    }

    fn parse(&self, text: &str, report: &Path) -> Result<ParsedReport> {
        match self {
            Self::VisualStudio => visual_studio::parse(text, report),
            Self::Ncover3 => ncover::parse(text, report),
            Self::OpenCover => opencover::parse(text, report),
            Self::DotCover => dotcover::parse(text, report),
        }
    }
}

impl fmt::Display for CoverageDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One per-line hit tuple as a dialect parser emits it, pre-merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLineHit {
    pub path: String,
    pub line: u32,
    pub hits: u64,
}

/// One branch-point tuple; only dialects with branch data emit these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBranchHit {
    pub path: String,
    pub line: u32,
    pub branch: u32,
    pub covered: bool,
}

/// Everything one report file contributed, before merging.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ParsedReport {
    pub line_hits: Vec<RawLineHit>,
    pub branches: Vec<RawBranchHit>,
}

/// Branch points known for one line, keyed by branch id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BranchLine(BTreeMap<u32, bool>);

impl BranchLine {
    fn merge(&mut self, branch: u32, covered: bool) {
        *self.0.entry(branch).or_insert(false) |= covered;
    }

    pub fn covered(&self) -> u32 {
        self.0.values().filter(|c| **c).count() as u32
    }

    pub fn total(&self) -> u32 {
        self.0.len() as u32
    }
}

/// Merged coverage for one source file, created lazily per distinct
/// canonical path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoverageFile {
    pub path: String,
    /// 1-based line to summed hit count.
    pub hits: BTreeMap<u32, u64>,
    pub branches: BTreeMap<u32, BranchLine>,
}

/// Outcome of one aggregation pass: merged files plus per-report failures.
#[derive(Default)]
pub struct CoverageAggregation {
    /// Sorted by canonical path.
    pub files: Vec<CoverageFile>,
    pub failures: Vec<ScanMergeError>,
}

/// Expand configured wildcard patterns into concrete `(report, dialect)`
/// pairs. A pattern matching nothing is worth a warning (a misconfigured
/// path looks exactly like that) but is not an error.
pub fn expand_patterns(
    configs: &[CoverageReportConfig],
) -> (Vec<(PathBuf, CoverageDialect)>, Vec<ScanMergeError>) {
    let mut reports = Vec::new();
    let mut failures = Vec::new();
    for config in configs {
        let paths = match glob::glob(&config.pattern) {
            Ok(paths) => paths,
            Err(e) => {
                failures.push(ScanMergeError::InvalidConfig {
                    path: PathBuf::from(&config.pattern),
                    message: format!("bad coverage report pattern: {e}"),
                });
                continue;
            }
        };
        let mut matched = 0usize;
        for entry in paths {
            match entry {
                Ok(path) => {
                    reports.push((path, config.dialect));
                    matched += 1;
                }
                Err(e) => tracing::warn!("Skipping unreadable coverage report match: {}", e),
            }
        }
        if matched == 0 {
            tracing::warn!(
                "Coverage pattern {} ({}) matched no reports",
                config.pattern,
                config.dialect
            );
        }
    }
    (reports, failures)
}

/// Parse and merge every `(report, dialect)` pair. Parse failures are
/// collected per report and do not abort siblings.
pub fn aggregate(
    reports: &[(PathBuf, CoverageDialect)],
    resolver: &PathResolver,
) -> CoverageAggregation {
    let mut by_path: AHashMap<String, CoverageFile> = AHashMap::new();
    let mut failures = Vec::new();

    for (report, dialect) in reports {
        let text = match fs::read_to_string(report) {
            Ok(text) => text,
            Err(e) => {
                failures.push(ScanMergeError::io(report, e));
                continue;
            }
        };
        match dialect.parse(&text, report) {
            Ok(parsed) => {
                tracing::debug!(
                    "Parsed {} ({}): {} line hits, {} branch points",
                    report.display(),
                    dialect,
                    parsed.line_hits.len(),
                    parsed.branches.len()
                );
                fold(&mut by_path, parsed, resolver);
            }
            Err(e) => {
                tracing::error!("Coverage report failed: {}", e);
                failures.push(e);
            }
        }
    }

    let mut files: Vec<CoverageFile> = by_path.into_values().collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));
    CoverageAggregation { files, failures }
}

fn fold(by_path: &mut AHashMap<String, CoverageFile>, parsed: ParsedReport, resolver: &PathResolver) {
    for hit in parsed.line_hits {
        let file = entry_for(by_path, &hit.path, resolver);
        *file.hits.entry(hit.line).or_insert(0) += hit.hits;
    }
    for branch in parsed.branches {
        let file = entry_for(by_path, &branch.path, resolver);
        file.branches
            .entry(branch.line)
            .or_default()
            .merge(branch.branch, branch.covered);
    }
}

fn entry_for<'m>(
    by_path: &'m mut AHashMap<String, CoverageFile>,
    reported: &str,
    resolver: &PathResolver,
) -> &'m mut CoverageFile {
    let canonical = resolver.resolve(reported);
    by_path
        .entry(canonical.clone())
        .or_insert_with(|| CoverageFile {
            path: canonical,
            ..CoverageFile::default()
        })
}

pub(crate) fn malformed(report: &Path, line: u64, message: impl Into<String>) -> ScanMergeError {
    ScanMergeError::MalformedReport {
        path: report.to_path_buf(),
        line,
        message: message.into(),
    }
}

/// 1-based line of a byte offset, for error messages pointing into XML.
pub(crate) fn line_of_offset(text: &str, offset: usize) -> u64 {
    let clamped = offset.min(text.len());
    text.as_bytes()[..clamped]
        .iter()
        .filter(|b| **b == b'\n')
        .count() as u64
        + 1
}

pub(crate) fn attr_value(element: &BytesStart<'_>, name: &str) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name.as_bytes())
        .and_then(|attr| attr.unescape_value().ok())
        .map(|value| value.into_owned())
}

pub(crate) fn require_attr(
    element: &BytesStart<'_>,
    name: &str,
    report: &Path,
    line: u64,
) -> Result<String> {
    attr_value(element, name).ok_or_else(|| {
        malformed(
            report,
            line,
            format!(
                "element <{}> is missing mandatory attribute {name}",
                String::from_utf8_lossy(element.name().as_ref())
            ),
        )
    })
}

pub(crate) fn parse_num<T: FromStr>(
    value: &str,
    attr: &str,
    report: &Path,
    line: u64,
) -> Result<T>
where
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e| {
        malformed(
            report,
            line,
            format!("attribute {attr}=\"{value}\" is not a valid number: {e}"),
        )
    })
}
