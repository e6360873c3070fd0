//! FWB error code helpers.
//!
//! FWB stores spreadsheet error values as a single byte code, reusing the
//! classic BIFF numbering so documents converted from legacy formats keep
//! their codes unchanged:
//!
//! | Code | Literal |
//! |------|---------|
//! | 0x00 | `#NULL!` |
//! | 0x07 | `#DIV/0!` |
//! | 0x0F | `#VALUE!` |
//! | 0x17 | `#REF!` |
//! | 0x1D | `#NAME?` |
//! | 0x24 | `#NUM!` |
//! | 0x2A | `#N/A` |
//! | 0x2B | `#GETTING_DATA` |
//!
//! Evaluators occasionally surface literals outside this table (newer Excel
//! generations keep inventing them); those are written with the
//! [`FALLBACK_ERROR_CODE`] rather than rejected, so a recompute can always
//! persist its result.

/// Code written for error literals that have no entry in the fixed table.
pub const FALLBACK_ERROR_CODE: u8 = 0x0F;

/// Return the canonical error literal for an FWB error `code`, if known.
pub fn error_literal(code: u8) -> Option<&'static str> {
    match code {
        0x00 => Some("#NULL!"),
        0x07 => Some("#DIV/0!"),
        0x0F => Some("#VALUE!"),
        0x17 => Some("#REF!"),
        0x1D => Some("#NAME?"),
        0x24 => Some("#NUM!"),
        0x2A => Some("#N/A"),
        0x2B => Some("#GETTING_DATA"),
        _ => None,
    }
}

/// Convert an error literal (e.g. `#DIV/0!`) into its FWB code.
///
/// Returns `None` for unknown literals.
pub fn error_code_from_literal(literal: &str) -> Option<u8> {
    match literal.trim().to_ascii_uppercase().as_str() {
        "#NULL!" => Some(0x00),
        "#DIV/0!" => Some(0x07),
        "#VALUE!" => Some(0x0F),
        "#REF!" => Some(0x17),
        "#NAME?" => Some(0x1D),
        "#NUM!" => Some(0x24),
        "#N/A" | "#N/A!" => Some(0x2A),
        "#GETTING_DATA" => Some(0x2B),
        _ => None,
    }
}

/// Convert an error literal into its FWB code, defaulting unknown literals
/// to [`FALLBACK_ERROR_CODE`].
pub fn error_code_for_literal(literal: &str) -> u8 {
    error_code_from_literal(literal).unwrap_or(FALLBACK_ERROR_CODE)
}

/// Human-readable display string for an FWB error `code`.
///
/// Unknown codes are displayed as `#ERR(0x??)` so the raw value isn't lost.
pub fn error_display(code: u8) -> String {
    match error_literal(code) {
        Some(lit) => lit.to_string(),
        None => format!("#ERR({code:#04x})"),
    }
}
