//! Visual Studio coverage XML.
//!
//! A `<results>` document with per-function `<range source_id covered
//! start_line end_line>` spans and a `<source_file id path>` table. The
//! table follows the ranges in document order, so spans are buffered and
//! joined once the document is read. Coverage is attribute-coded: `yes`
//! and `partial` count one hit per line, `no` counts zero.

use std::path::Path;

use ahash::AHashMap;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::coverage::{
    line_of_offset, malformed, parse_num, require_attr, ParsedReport, RawLineHit,
};
use crate::error::Result;

pub(crate) fn parse(text: &str, report: &Path) -> Result<ParsedReport> {
    let mut reader = Reader::from_str(text);
    let mut sources: AHashMap<String, String> = AHashMap::new();
    let mut spans: Vec<(String, u64, u32, u32)> = Vec::new();
    let mut root_seen = false;

    loop {
        let at = reader.buffer_position();
        match reader.read_event() {
            Err(e) => {
                return Err(malformed(
                    report,
                    line_of_offset(text, reader.buffer_position()),
                    format!("XML syntax: {e}"),
                ));
            }
            Ok(Event::Eof) => break,
            Ok(Event::Start(element)) | Ok(Event::Empty(element)) => {
                let line = line_of_offset(text, at);
                let name = element.name();
                if !root_seen {
                    if name.as_ref() != b"results" {
                        return Err(malformed(
                            report,
                            line,
                            format!(
                                "unexpected root element <{}>, expected <results>",
                                String::from_utf8_lossy(name.as_ref())
                            ),
                        ));
                    }
                    root_seen = true;
                    continue;
                }
                match name.as_ref() {
                    b"source_file" => {
                        let id = require_attr(&element, "id", report, line)?;
                        let path = require_attr(&element, "path", report, line)?;
                        sources.insert(id, path);
                    }
                    b"range" => {
                        let source_id = require_attr(&element, "source_id", report, line)?;
                        let covered = require_attr(&element, "covered", report, line)?;
                        let hits = match covered.as_str() {
                            "yes" | "partial" => 1,
                            "no" => 0,
                            other => {
                                return Err(malformed(
                                    report,
                                    line,
                                    format!("covered=\"{other}\" is not one of yes/partial/no"),
                                ));
                            }
                        };
                        let start: u32 = parse_num(
                            &require_attr(&element, "start_line", report, line)?,
                            "start_line",
                            report,
                            line,
                        )?;
                        let end: u32 = parse_num(
                            &require_attr(&element, "end_line", report, line)?,
                            "end_line",
                            report,
                            line,
                        )?;
                        spans.push((source_id, hits, start, end));
                    }
                    _ => {}
                }
            }
            Ok(_) => {}
        }
    }

    if !root_seen {
        return Err(malformed(report, 1, "empty document, expected <results>"));
    }

    let mut parsed = ParsedReport::default();
    for (source_id, hits, start, end) in spans {
        let Some(path) = sources.get(&source_id) else {
            tracing::debug!("Range references unknown source_file id {}", source_id);
            continue;
        };
        if start == 0 {
            continue;
        }
        for line in start..=end.max(start) {
            parsed.line_hits.push(RawLineHit {
                path: path.clone(),
                line,
                hits,
            });
        }
    }
    Ok(parsed)
}
