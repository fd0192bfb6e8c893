//! Text locations and analyzer-range repair.
//!
//! Analyzer tooling is known to report two kinds of defective ranges: a
//! start position one-past-end-of-line instead of the start of the next
//! line, and a multi-line end column overshooting the true end of the last
//! line. `normalize_range` absorbs both without rejecting otherwise-valid
//! findings; anything it cannot repair degrades to line- or file-level in
//! the caller.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::index::LineLengths;

/// A text range. Lines are 1-based, offsets 0-based; a valid range satisfies
/// `start_line < end_line`, or equal lines with `start_offset < end_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start_line: u32,
    pub start_offset: u32,
    pub end_line: u32,
    pub end_offset: u32,
}

impl TextRange {
    pub fn new(start_line: u32, start_offset: u32, end_line: u32, end_offset: u32) -> Self {
        Self {
            start_line,
            start_offset,
            end_line,
            end_offset,
        }
    }

    /// Whether the range selects at least one character position.
    pub fn is_ordered(&self) -> bool {
        self.start_line < self.end_line
            || (self.start_line == self.end_line && self.start_offset < self.end_offset)
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line, self.start_offset, self.end_line, self.end_offset
        )
    }
}

/// A location inside a known file. `range: None` means the file is known but
/// no sub-range survived validation; such locations are published at file
/// granularity, never as empty ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub path: String,
    pub range: Option<TextRange>,
}

impl SourceLocation {
    pub fn file_level(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            range: None,
        }
    }

    pub fn with_range(path: impl Into<String>, range: TextRange) -> Self {
        Self {
            path: path.into(),
            range: Some(range),
        }
    }
}

/// Repair an analyzer-reported range against the file's line-length table.
///
/// 1. A start offset at or past end-of-line rolls forward to the start of
///    the next line (the offset `0` exemption keeps a legitimate start on an
///    empty line in place, and makes normalization idempotent).
/// 2. An end offset past end-of-line is clamped to the line length; ending
///    exactly at EOL is allowed.
/// 3. An end line past end-of-file is clamped to the last line's EOL.
///
/// Returns `None` when no non-empty range survives: line numbers outside the
/// file, or a range that collapses after adjustment. The single-line range
/// starting exactly at EOL falls out of step 1 + the emptiness check: it is
/// discarded entirely rather than rolled onto the next line.
pub fn normalize_range(table: &LineLengths, candidate: &TextRange) -> Option<TextRange> {
    let mut range = *candidate;

    if range.start_line == 0 || range.end_line == 0 {
        return None;
    }
    let start_len = table.get(range.start_line)?;

    if table.get(range.end_line).is_none() {
        let last = table.line_count();
        if last == 0 {
            return None;
        }
        range.end_line = last;
        range.end_offset = table.get(last).unwrap_or(0);
    }

    // One-past-EOL start: the analyzer meant the next line. Offset 0 never
    // rolls, so a start on an empty line stays put and a rolled range stays
    // fixed under re-normalization.
    if range.start_offset > 0 && range.start_offset >= start_len {
        range.start_line += 1;
        range.start_offset = 0;
    }

    // Overshooting end column: trim, do not roll.
    if let Some(end_len) = table.get(range.end_line) {
        if range.end_offset > end_len {
            range.end_offset = end_len;
        }
    }

    if !range.is_ordered() {
        return None;
    }
    Some(range)
}
