//! Content-address hashing for incremental-cache keys.
//!
//! Cache keys must change whenever a file changes at the byte level, so the
//! digest runs over the raw content with any byte-order mark included
//! verbatim. BLAKE3 is the fixed algorithm; keys from different algorithm
//! versions never compare equal, so it stays fixed.

use std::fs;
use std::path::Path;

use crate::error::{Result, ScanMergeError};

/// Number of bytes in a content digest.
pub const DIGEST_LEN: usize = 32;

/// Hash the raw byte content of `path`.
///
/// Fails with an I/O classification when the file cannot be read; callers
/// log and skip that single file rather than aborting the batch.
pub fn hash_file(path: &Path) -> Result<[u8; DIGEST_LEN]> {
    let bytes = fs::read(path).map_err(|e| ScanMergeError::io(path, e))?;
    Ok(hash_bytes(&bytes))
}

/// Hash a byte slice. Exposed separately so tests can pin digests without
/// touching the filesystem.
pub fn hash_bytes(bytes: &[u8]) -> [u8; DIGEST_LEN] {
    *blake3::hash(bytes).as_bytes()
}

/// Lowercase hex rendering of a digest, for logs and the CLI.
pub fn to_hex(digest: &[u8; DIGEST_LEN]) -> String {
    let mut out = String::with_capacity(DIGEST_LEN * 2);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}
