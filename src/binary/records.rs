//! Record structs carried by the binary report streams.
//!
//! One record per physical source file in every stream. Field order is the
//! wire layout (bincode encodes structs positionally); reordering or
//! retyping a field is a breaking toolchain change.

use serde::{Deserialize, Serialize};

use crate::binary::highlights::TokenKind;
use crate::location::TextRange;

/// Per-file counters from the metrics stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub file_path: String,
    pub lines: u32,
    pub statements: u32,
    pub complexity: u32,
    pub cognitive_complexity: u32,
    /// 1-based lines carrying an in-source suppression marker.
    pub nosonar_lines: Vec<u32>,
}

/// Syntax-highlighting spans for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightRecord {
    pub file_path: String,
    pub tokens: Vec<TokenSpan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpan {
    pub range: TextRange,
    pub kind: TokenKind,
}

/// Symbol table for one file: each symbol is a declaration plus the spans
/// that reference it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub file_path: String,
    pub symbols: Vec<SymbolSpan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSpan {
    pub declaration: TextRange,
    pub references: Vec<TextRange>,
}

/// Copy/paste-detection token stream for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpdRecord {
    pub file_path: String,
    pub tokens: Vec<CpdTokenSpan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpdTokenSpan {
    pub range: TextRange,
    /// The token image hashed by the duplicate detector. Literals arrive
    /// pre-replaced with placeholder images so equal structure matches.
    pub image: String,
}

/// Generated-flag and detected-encoding facts for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadataRecord {
    pub file_path: String,
    pub generated: bool,
    /// Charset label as the toolchain detected it (for example `UTF-8`,
    /// `UTF-16`, `US-ASCII`); `None` when detection was not attempted.
    pub encoding: Option<String>,
}
