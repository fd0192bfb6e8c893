//! OpenCover XML.
//!
//! A `<CoverageSession>` document with per-module `<File uid fullPath>`
//! tables, `<SequencePoint fileid sl vc>` line points and `<BranchPoint
//! fileid sl path vc>` branch points. The only dialect carrying branch
//! data: `path` is the branch id within its line, and a visit count above
//! zero marks that branch covered.

use std::path::Path;

use ahash::AHashMap;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::coverage::{
    line_of_offset, malformed, parse_num, require_attr, ParsedReport, RawBranchHit, RawLineHit,
};
use crate::error::Result;

pub(crate) fn parse(text: &str, report: &Path) -> Result<ParsedReport> {
    let mut reader = Reader::from_str(text);
    let mut files: AHashMap<String, String> = AHashMap::new();
    let mut sequence_points: Vec<(String, u32, u64)> = Vec::new();
    let mut branch_points: Vec<(String, u32, u32, bool)> = Vec::new();
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
                    if name.as_ref() != b"CoverageSession" {
                        return Err(malformed(
                            report,
                            line,
                            format!(
                                "unexpected root element <{}>, expected <CoverageSession>",
                                String::from_utf8_lossy(name.as_ref())
                            ),
                        ));
                    }
                    root_seen = true;
                    continue;
                }
                match name.as_ref() {
                    b"File" => {
                        let uid = require_attr(&element, "uid", report, line)?;
                        let full_path = require_attr(&element, "fullPath", report, line)?;
                        files.insert(uid, full_path);
                    }
                    b"SequencePoint" => {
                        let fileid = require_attr(&element, "fileid", report, line)?;
                        let sl: u32 = parse_num(
                            &require_attr(&element, "sl", report, line)?,
                            "sl",
                            report,
                            line,
                        )?;
                        let vc: u64 = parse_num(
                            &require_attr(&element, "vc", report, line)?,
                            "vc",
                            report,
                            line,
                        )?;
                        sequence_points.push((fileid, sl, vc));
                    }
                    b"BranchPoint" => {
                        let fileid = require_attr(&element, "fileid", report, line)?;
                        let sl: u32 = parse_num(
                            &require_attr(&element, "sl", report, line)?,
                            "sl",
                            report,
                            line,
                        )?;
                        let branch: u32 = parse_num(
                            &require_attr(&element, "path", report, line)?,
                            "path",
                            report,
                            line,
                        )?;
                        let vc: u64 = parse_num(
                            &require_attr(&element, "vc", report, line)?,
                            "vc",
                            report,
                            line,
                        )?;
                        branch_points.push((fileid, sl, branch, vc > 0));
                    }
                    _ => {}
                }
            }
            Ok(_) => {}
        }
    }

    if !root_seen {
        return Err(malformed(
            report,
            1,
            "empty document, expected <CoverageSession>",
        ));
    }

    let mut parsed = ParsedReport::default();
    for (fileid, line, vc) in sequence_points {
        let Some(path) = files.get(&fileid) else {
            tracing::debug!("Sequence point references unknown fileid {}", fileid);
            continue;
        };
        if line == 0 {
            continue;
        }
        parsed.line_hits.push(RawLineHit {
            path: path.clone(),
            line,
            hits: vc,
        });
    }
    for (fileid, line, branch, covered) in branch_points {
        let Some(path) = files.get(&fileid) else {
            continue;
        };
        if line == 0 {
            continue;
        }
        parsed.branches.push(RawBranchHit {
            path: path.clone(),
            line,
            branch,
            covered,
        });
    }
    Ok(parsed)
}
