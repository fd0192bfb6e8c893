//! Incremental-analysis cache keys.
//!
//! After reconciliation, every file that survived into the final view gets
//! a `(relative path, content digest)` pair written to a [`CacheSink`] the
//! host supplies. The pass is all-or-nothing at the gate and best-effort
//! per file: pull-request runs, disabled caching, and a missing base path
//! skip it entirely with an info log, while a file that cannot be hashed
//! is counted and skipped without failing the run.

use std::path::Path;

use serde::Serialize;

use crate::hashing::{self, DIGEST_LEN};
use crate::index::FileIndex;

/// Where cache keys go. The host decides whether that is a wire protocol,
/// a directory of key files, or a test buffer.
pub trait CacheSink {
    fn write(&mut self, relative_path: &str, digest: &[u8; DIGEST_LEN]);
}

/// Sink that keeps every key in memory, for the CLI driver and tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub entries: Vec<(String, [u8; DIGEST_LEN])>,
}

impl CacheSink for CollectingSink {
    fn write(&mut self, relative_path: &str, digest: &[u8; DIGEST_LEN]) {
        self.entries.push((relative_path.to_string(), *digest));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    PullRequest,
    CachingDisabled,
    NoBasePath,
}

/// What the cache-key pass did, carried into the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CachePass {
    Skipped { reason: SkipReason },
    Completed { written: usize, failed: usize },
}

impl CachePass {
    pub fn written(&self) -> usize {
        match self {
            Self::Skipped { .. } => 0,
            Self::Completed { written, .. } => *written,
        }
    }
}

/// Hash every indexed file and hand base-relative keys to `sink`.
///
/// Relative paths always use `/` separators so keys match across the
/// platforms a build farm mixes.
pub fn produce_cache_keys(
    index: &dyn FileIndex,
    base: Option<&Path>,
    pull_request: bool,
    cache_enabled: bool,
    sink: &mut dyn CacheSink,
) -> CachePass {
    if pull_request {
        tracing::info!("Pull request analysis, cache keys are not produced");
        return CachePass::Skipped {
            reason: SkipReason::PullRequest,
        };
    }
    if !cache_enabled {
        tracing::info!("Caching disabled, cache keys are not produced");
        return CachePass::Skipped {
            reason: SkipReason::CachingDisabled,
        };
    }
    let Some(base) = base else {
        tracing::info!("No base path configured, cache keys are not produced");
        return CachePass::Skipped {
            reason: SkipReason::NoBasePath,
        };
    };

    let mut written = 0usize;
    let mut failed = 0usize;
    for file in index.files() {
        let path = Path::new(&file.path);
        let Ok(relative) = path.strip_prefix(base) else {
            tracing::warn!(
                "Not producing a cache key for {}: outside base path {}",
                file.path,
                base.display()
            );
            failed += 1;
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        match hashing::hash_file(path) {
            Ok(digest) => {
                sink.write(&relative, &digest);
                written += 1;
            }
            Err(e) => {
                tracing::warn!("Not producing a cache key for {}: {}", file.path, e);
                failed += 1;
            }
        }
    }
    tracing::debug!("Cache keys: {} written, {} failed", written, failed);
    CachePass::Completed { written, failed }
}
