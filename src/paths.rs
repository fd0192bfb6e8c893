//! Canonical path identity with a process-lifetime memo cache.
//!
//! Report files refer to sources by whatever casing and symlink spelling the
//! compiler happened to see; the host file index stores the real on-disk
//! path. `PathResolver` is the only defense against that drift: it
//! canonicalizes reported paths against the filesystem and memoizes the
//! answer, since the same path is resolved thousands of times for large
//! solutions.

use std::path::{Path, PathBuf};

use ahash::AHashMap;
use parking_lot::Mutex;

/// Counters describing the cache behavior of a [`PathResolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

struct ResolverInner {
    cache: AHashMap<String, String>,
    hits: u64,
    misses: u64,
}

/// Memoized path canonicalization.
///
/// `resolve` never fails: when the file does not exist, the path is
/// malformed, or the filesystem refuses us, the input is returned unchanged
/// and a debug diagnostic is recorded. The memo cache is an exact-string
/// map (callers pass already-normalized strings) and is never evicted.
///
/// Shared across module import threads; the inner map is mutex-guarded.
pub struct PathResolver {
    inner: Mutex<ResolverInner>,
}

impl PathResolver {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ResolverInner {
                cache: AHashMap::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Canonicalize `path` against the filesystem, memoized.
    ///
    /// Resolves symlinks and corrects path casing to the on-disk spelling.
    /// On any failure the input is returned verbatim.
    pub fn resolve(&self, path: &str) -> String {
        let mut inner = self.inner.lock();
        if let Some(resolved) = inner.cache.get(path) {
            let resolved = resolved.clone();
            inner.hits += 1;
            return resolved;
        }

        let resolved = match Path::new(path).canonicalize() {
            Ok(real) => strip_verbatim_prefix(&real).to_string_lossy().into_owned(),
            Err(e) => {
                tracing::debug!("Failed to canonicalize {}: {}, keeping reported path", path, e);
                path.to_string()
            }
        };

        inner.misses += 1;
        inner.cache.insert(path.to_string(), resolved.clone());
        resolved
    }

    /// Hit/miss counters and current cache size.
    pub fn stats(&self) -> ResolverStats {
        let inner = self.inner.lock();
        ResolverStats {
            hits: inner.hits,
            misses: inner.misses,
            entries: inner.cache.len(),
        }
    }
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonicalize a single path the way [`PathResolver`] does, without the
/// memo cache. The index builder uses this so index keys and resolver
/// output agree byte-for-byte.
pub(crate) fn canonical_string(path: &Path) -> String {
    match path.canonicalize() {
        Ok(real) => strip_verbatim_prefix(&real).to_string_lossy().into_owned(),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

/// Strip the Windows `\\?\` prefix that `canonicalize` produces, so cached
/// identities compare equal to paths from the host index. No-op on Unix.
fn strip_verbatim_prefix(path: &Path) -> PathBuf {
    #[cfg(windows)]
    {
        let s = path.to_string_lossy();
        if let Some(stripped) = s.strip_prefix(r"\\?\UNC\") {
            return PathBuf::from(format!(r"\\{}", stripped));
        }
        if let Some(stripped) = s.strip_prefix(r"\\?\") {
            return PathBuf::from(stripped);
        }
    }
    path.to_path_buf()
}
