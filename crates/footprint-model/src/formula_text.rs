//! Helpers for formula strings shared by the codec and the engine.
//!
//! # Invariant
//!
//! The canonical formula representation stored in [`crate::Cell::formula`] is
//! trimmed and **without** a leading `=`. The binary format stores formulas
//! the same way; UIs conventionally display them with one.

/// Normalize formula text into the canonical stored representation.
///
/// Trims whitespace and strips a single leading `=`. Deliberately does not
/// validate syntax; the engine owns that.
pub fn normalize_formula_text(s: &str) -> String {
    let mut trimmed = s.trim();
    if let Some(rest) = trimmed.strip_prefix('=') {
        trimmed = rest.trim();
    }
    trimmed.to_string()
}

/// Convert formula text into display form (leading `=`, or empty).
pub fn display_formula_text(s: &str) -> String {
    let normalized = normalize_formula_text(s);
    if normalized.is_empty() {
        String::new()
    } else {
        format!("={normalized}")
    }
}
