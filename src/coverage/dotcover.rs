//! dotCover HTML.
//!
//! Not XML: an HTML page with two kinds of embedded script calls. A
//! `fileIndex({...})` call maps file indices to source paths, and each
//! covered file contributes a `<script ... data-file-index="N">` line whose
//! `highlightRanges([[sl, sc, el, ec, covered], ...])` payload is a JSON
//! array of five-element ranges. The scan is line oriented; loading a full
//! HTML parser for two known script shapes is not worth it. The file table
//! may follow the highlight blocks, so blocks are buffered and joined at
//! the end.

use std::collections::BTreeMap;
use std::path::Path;

use crate::coverage::{malformed, ParsedReport, RawLineHit};
use crate::error::Result;

pub(crate) fn parse(text: &str, report: &Path) -> Result<ParsedReport> {
    let mut files: BTreeMap<String, String> = BTreeMap::new();
    let mut blocks: Vec<(String, u64, Vec<[i64; 5]>)> = Vec::new();

    for (number, line) in text.lines().enumerate() {
        let number = number as u64 + 1;
        if let Some(payload) = extract_call(line, "fileIndex") {
            let table: BTreeMap<String, String> = serde_json::from_str(payload)
                .map_err(|e| malformed(report, number, format!("fileIndex payload: {e}")))?;
            files.extend(table);
            continue;
        }
        let Some(index) = extract_attr_value(line, "data-file-index") else {
            continue;
        };
        let Some(payload) = extract_call(line, "highlightRanges") else {
            return Err(malformed(
                report,
                number,
                "data-file-index without a highlightRanges call",
            ));
        };
        let ranges: Vec<[i64; 5]> = serde_json::from_str(payload)
            .map_err(|e| malformed(report, number, format!("highlightRanges payload: {e}")))?;
        blocks.push((index.to_string(), number, ranges));
    }

    if !blocks.is_empty() && files.is_empty() {
        return Err(malformed(
            report,
            1,
            "highlight blocks present but no fileIndex table",
        ));
    }

    let mut parsed = ParsedReport::default();
    for (index, number, ranges) in blocks {
        let Some(path) = files.get(&index) else {
            tracing::debug!("Highlight block references unknown file index {}", index);
            continue;
        };
        for range in ranges {
            let [start, _, end, _, covered] = range;
            if start < 1 || end < start || end > i64::from(u32::MAX) {
                return Err(malformed(
                    report,
                    number,
                    format!("highlight range {range:?} is not a valid line span"),
                ));
            }
            let hits = u64::from(covered != 0);
            for line in start as u32..=end as u32 {
                parsed.line_hits.push(RawLineHit {
                    path: path.clone(),
                    line,
                    hits,
                });
            }
        }
    }
    Ok(parsed)
}

/// The JSON argument of `function(...)` if the line carries such a call.
/// Payloads never contain `)`, so the last closing paren on the line is
/// the end of the call.
fn extract_call<'t>(line: &'t str, function: &str) -> Option<&'t str> {
    let start = line.find(function)? + function.len();
    let rest = line[start..].strip_prefix('(')?;
    let close = rest.rfind(')')?;
    Some(&rest[..close])
}

fn extract_attr_value<'t>(line: &'t str, attr: &str) -> Option<&'t str> {
    let start = line.find(attr)? + attr.len();
    let rest = line[start..].strip_prefix("=\"")?;
    let close = rest.find('"')?;
    Some(&rest[..close])
}
