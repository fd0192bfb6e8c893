//! Length-delimited record framing shared by all binary report streams.
//!
//! A stream file is a plain concatenation of records, each framed as a
//! little-endian `u32` byte length followed by a bincode payload of exactly
//! that many bytes. The toolchain writes streams append-only, so a crash
//! mid-write leaves a torn tail; decoding reports that as a malformed
//! stream rather than returning a partial batch.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, ScanMergeError};

/// Upper bound on a single framed record. A length prefix above this is a
/// corrupt stream, not an allocation request.
const MAX_RECORD_LEN: u32 = 16 * 1024 * 1024;

/// Read and decode every record in a stream file.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let bytes = fs::read(path).map_err(|e| ScanMergeError::io(path, e))?;
    decode_stream(&bytes, path)
}

fn decode_stream<T: DeserializeOwned>(bytes: &[u8], path: &Path) -> Result<Vec<T>> {
    let mut records = Vec::new();
    let mut cursor = 0usize;
    while cursor < bytes.len() {
        let index = records.len();
        if bytes.len() - cursor < 4 {
            return Err(malformed(
                path,
                index,
                format!("torn length prefix ({} trailing bytes)", bytes.len() - cursor),
            ));
        }
        let prefix = [
            bytes[cursor],
            bytes[cursor + 1],
            bytes[cursor + 2],
            bytes[cursor + 3],
        ];
        let len = u32::from_le_bytes(prefix);
        if len > MAX_RECORD_LEN {
            return Err(malformed(
                path,
                index,
                format!("record length {len} exceeds the {MAX_RECORD_LEN}-byte cap"),
            ));
        }
        cursor += 4;
        let len = len as usize;
        if bytes.len() - cursor < len {
            return Err(malformed(
                path,
                index,
                format!(
                    "torn record: length prefix promises {len} bytes, {} remain",
                    bytes.len() - cursor
                ),
            ));
        }
        let payload = &bytes[cursor..cursor + len];
        let record = bincode::deserialize(payload)
            .map_err(|e| malformed(path, index, format!("undecodable payload: {e}")))?;
        records.push(record);
        cursor += len;
    }
    Ok(records)
}

/// Frame one record onto the end of a stream buffer.
///
/// This is the encoder counterpart of [`read_records`]; the engine itself
/// never writes streams, but fixture builders and toolchain shims do, and
/// keeping both directions here keeps the framing in one place.
pub fn append_record<T: Serialize>(buf: &mut Vec<u8>, record: &T) -> Result<()> {
    let payload = bincode::serialize(record).map_err(|e| ScanMergeError::MalformedRecordStream {
        path: Path::new("<in-memory>").to_path_buf(),
        record: 0,
        message: format!("unencodable record: {e}"),
    })?;
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(())
}

fn malformed(path: &Path, record: usize, message: String) -> ScanMergeError {
    ScanMergeError::MalformedRecordStream {
        path: path.to_path_buf(),
        record,
        message,
    }
}
