//! Error types and exit codes for scanmerge

use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Main error type for scanmerge operations.
///
/// Only conditions from the fatal half of the error taxonomy become
/// `ScanMergeError` values: unreadable configuration, a malformed report
/// file, or a rule-id collision between two repositories. Recoverable
/// conditions (missing report files, unmatched paths, per-file hash
/// failures) are logged and folded into import outcomes instead.
#[derive(Error, Debug)]
pub enum ScanMergeError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid run configuration {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    #[error("Malformed report {path} (line {line}): {message}")]
    MalformedReport {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("Malformed record stream {path} (record {record}): {message}")]
    MalformedRecordStream {
        path: PathBuf,
        record: usize,
        message: String,
    },

    #[error(
        "Rule id '{rule}' is claimed by two repositories: '{first}' and '{second}'; \
         issue attribution would be ambiguous"
    )]
    RuleIdCollision {
        rule: String,
        first: String,
        second: String,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScanMergeError {
    /// Convenience constructor for I/O failures that carry the offending path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Convert error to appropriate exit code:
    /// - 0: Success
    /// - 1: File not found / IO error
    /// - 2: Invalid run configuration
    /// - 3: Malformed report or record stream
    /// - 4: Rule id collision (configuration contradiction)
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::FileNotFound { .. } => ExitCode::from(1),
            Self::Io { .. } => ExitCode::from(1),
            Self::InvalidConfig { .. } => ExitCode::from(2),
            Self::MalformedReport { .. } => ExitCode::from(3),
            Self::MalformedRecordStream { .. } => ExitCode::from(3),
            Self::RuleIdCollision { .. } => ExitCode::from(4),
        }
    }
}

/// Result type alias for scanmerge operations
pub type Result<T> = std::result::Result<T, ScanMergeError>;
