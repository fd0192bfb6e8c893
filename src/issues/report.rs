//! Serde model of the JSON issue report format.
//!
//! One document per module (or aggregated across modules): a rule
//! dictionary followed by an issue list. Everything optional in the wild is
//! optional here; a document missing mandatory structure (rule ids, issue
//! messages) fails deserialization and is reported with the source line.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, ScanMergeError};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueReport {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub rules: Vec<RuleDecl>,
    #[serde(default)]
    pub issues: Vec<RawIssue>,
}

/// A rule as declared in the report's dictionary. Declared defaults apply
/// when the issue instance carries no level of its own.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDecl {
    pub id: String,
    #[serde(default)]
    pub default_level: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// One reported issue instance. Scope is encoded structurally: no `path`
/// means project scope, `path` without `range` means file scope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIssue {
    pub rule_id: String,
    #[serde(default)]
    pub level: Option<String>,
    pub message: String,
    #[serde(default)]
    pub module_id: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    /// `[startLine, startOffset, endLine, endOffset]`, 1-based lines,
    /// 0-based offsets. Signed on the wire; anything negative degrades.
    #[serde(default)]
    pub range: Option<[i64; 4]>,
    #[serde(default)]
    pub secondary: Vec<RawSecondary>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSecondary {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub range: Option<[i64; 4]>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Parse one report file, mapping JSON errors to a malformed-report error
/// carrying the 1-based line of the offending construct.
pub fn parse_report_file(path: &Path) -> Result<IssueReport> {
    let text = fs::read_to_string(path).map_err(|e| ScanMergeError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| ScanMergeError::MalformedReport {
        path: path.to_path_buf(),
        line: e.line() as u64,
        message: e.to_string(),
    })
}
