//! Source-encoding facts: label normalization, BOM sniffing, equivalence.
//!
//! The analysis toolchain reports one detected encoding label per file and
//! the host file index carries its own. The two come from different naming
//! universes (".NET name" vs. IANA label), so comparisons go through a
//! normalized canonical form. A file whose two labels disagree is excluded
//! from indexing because all downstream line/offset math would be wrong.

use encoding_rs::Encoding;

/// Normalize an encoding label for comparison: trim, uppercase, and strip
/// separator characters so `"utf-8"`, `"UTF_8"` and `"Utf8"` all compare
/// equal.
pub fn normalize_label(label: &str) -> String {
    label
        .trim()
        .chars()
        .filter(|c| *c != '-' && *c != '_' && *c != ' ')
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Fold a normalized label into its canonical group.
///
/// The toolchain says "UTF-16" where the host says "UTF-16LE": both mean
/// little-endian UTF-16 (the BCL's `Encoding.Unicode`), so they land in one
/// group. Big-endian stays separate. US-ASCII deliberately does NOT fold
/// into UTF-8: a toolchain/host disagreement there still signals that the
/// two sides decoded the file differently.
fn canonical_group(normalized: &str) -> &str {
    match normalized {
        "UTF16" | "UTF16LE" | "UNICODE" => "UTF16LE",
        "UTF16BE" | "BIGENDIANUNICODE" | "UNICODEFFFE" => "UTF16BE",
        "ASCII" | "USASCII" => "USASCII",
        other => other,
    }
}

/// Whether two encoding labels denote the same encoding for reconciliation
/// purposes.
///
/// # Examples
///
/// ```
/// use scanmerge::encoding::labels_equivalent;
///
/// assert!(labels_equivalent("UTF-16", "utf-16LE"));
/// assert!(labels_equivalent("utf-8", "UTF8"));
/// assert!(!labels_equivalent("UTF-8", "US-ASCII"));
/// ```
pub fn labels_equivalent(a: &str, b: &str) -> bool {
    let a = normalize_label(a);
    let b = normalize_label(b);
    canonical_group(&a) == canonical_group(&b)
}

/// Sniff a byte-order mark and return the encoding label it implies.
pub fn sniff_bom(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        Some("UTF-8")
    } else if bytes.starts_with(&[0xFF, 0xFE]) {
        Some("UTF-16LE")
    } else if bytes.starts_with(&[0xFE, 0xFF]) {
        Some("UTF-16BE")
    } else {
        None
    }
}

/// Decode raw file bytes to text for line-length computation.
///
/// Precedence: a byte-order mark wins, then the declared label (resolved
/// through `encoding_rs`), then UTF-8 with lossy replacement. The decoded
/// text never includes the BOM character.
pub fn decode_to_string(bytes: &[u8], declared: Option<&str>) -> String {
    if bytes.starts_with(&[0xFF, 0xFE]) {
        let (decoded, _, _) = encoding_rs::UTF_16LE.decode(&bytes[2..]);
        return decoded.into_owned();
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let (decoded, _, _) = encoding_rs::UTF_16BE.decode(&bytes[2..]);
        return decoded.into_owned();
    }
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(&bytes[3..]).into_owned();
    }

    if let Some(label) = declared {
        if let Some(encoding) = Encoding::for_label(label.as_bytes()) {
            let (decoded, _, _) = encoding.decode(bytes);
            return decoded.into_owned();
        }
    }

    String::from_utf8_lossy(bytes).into_owned()
}
