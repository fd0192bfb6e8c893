//! NCover3 XML.
//!
//! A `<coverage>` document with a `<doc id url>` index and `<seqpnt doc
//! line visitcount>` sequence points. Documents whose url is the literal
//! `None` are module placeholders; their points carry no file and drop.

use std::path::Path;

use ahash::AHashMap;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::coverage::{
    line_of_offset, malformed, parse_num, require_attr, ParsedReport, RawLineHit,
};
use crate::error::Result;

const EXCLUDED_URL: &str = "None";

pub(crate) fn parse(text: &str, report: &Path) -> Result<ParsedReport> {
    let mut reader = Reader::from_str(text);
    let mut docs: AHashMap<String, String> = AHashMap::new();
    let mut points: Vec<(String, u32, u64)> = Vec::new();
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
                    if name.as_ref() != b"coverage" {
                        return Err(malformed(
                            report,
                            line,
                            format!(
                                "unexpected root element <{}>, expected <coverage>",
                                String::from_utf8_lossy(name.as_ref())
                            ),
                        ));
                    }
                    root_seen = true;
                    continue;
                }
                match name.as_ref() {
                    b"doc" => {
                        let id = require_attr(&element, "id", report, line)?;
                        let url = require_attr(&element, "url", report, line)?;
                        if url != EXCLUDED_URL {
                            docs.insert(id, url);
                        }
                    }
                    b"seqpnt" => {
                        let doc = require_attr(&element, "doc", report, line)?;
                        let source_line: u32 = parse_num(
                            &require_attr(&element, "line", report, line)?,
                            "line",
                            report,
                            line,
                        )?;
                        let visits: u64 = parse_num(
                            &require_attr(&element, "visitcount", report, line)?,
                            "visitcount",
                            report,
                            line,
                        )?;
                        points.push((doc, source_line, visits));
                    }
                    _ => {}
                }
            }
            Ok(_) => {}
        }
    }

    if !root_seen {
        return Err(malformed(report, 1, "empty document, expected <coverage>"));
    }

    let mut parsed = ParsedReport::default();
    for (doc, line, visits) in points {
        let Some(path) = docs.get(&doc) else {
            tracing::debug!("Sequence point references unknown doc id {}", doc);
            continue;
        };
        if line == 0 {
            continue;
        }
        parsed.line_hits.push(RawLineHit {
            path: path.clone(),
            line,
            hits: visits,
        });
    }
    Ok(parsed)
}
