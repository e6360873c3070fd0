//! Formula dialect canonicalization.
//!
//! Workbooks authored in legacy spreadsheet applications store formula text
//! in the author's dialect. Decoding rewrites each formula into the form the
//! recompute engine evaluates:
//!
//! - function names are upper-cased (`sum(` → `SUM(`)
//! - the `CONCAT` alias becomes `CONCATENATE`
//! - bare logical literals become calls (`TRUE` → `TRUE()`)
//! - `;` argument separators become `,`
//!
//! Content inside string literals (`"..."` with doubled-quote escapes) and
//! quoted sheet names (`'...'`) is never touched. The rewrite is idempotent,
//! so re-decoding an encoded document yields identical text.

/// Canonicalize one formula (canonical storage form, no leading `=`).
pub fn canonicalize_formula(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'"' | b'\'' => {
                i = copy_quoted(text, i, b as char, &mut out);
            }
            b';' => {
                out.push(',');
                i += 1;
            }
            _ if b.is_ascii_alphabetic() || b == b'_' => {
                let start = i;
                while i < bytes.len() && is_ident_byte(bytes[i]) {
                    i += 1;
                }
                let ident = &text[start..i];
                let next = bytes.get(i).copied();
                push_ident(ident, next, &mut out);
            }
            _ => {
                // Multi-byte UTF-8 falls through here one char at a time.
                let ch = text[i..].chars().next().expect("in-bounds char");
                out.push(ch);
                i += ch.len_utf8();
            }
        }
    }

    out
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'$'
}

/// Copy a quoted region verbatim, honoring doubled-quote escapes. Returns
/// the index just past the closing quote (or the end of input if unclosed;
/// the engine will report the syntax error).
fn copy_quoted(text: &str, start: usize, quote: char, out: &mut String) -> usize {
    let bytes = text.as_bytes();
    let q = quote as u8;
    out.push(quote);
    let mut i = start + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if b == q {
            if bytes.get(i + 1) == Some(&q) {
                out.push(quote);
                out.push(quote);
                i += 2;
                continue;
            }
            out.push(quote);
            return i + 1;
        }
        let ch = text[i..].chars().next().expect("in-bounds char");
        out.push(ch);
        i += ch.len_utf8();
    }
    i
}

fn push_ident(ident: &str, next: Option<u8>, out: &mut String) {
    if next == Some(b'(') {
        let upper = ident.to_ascii_uppercase();
        if upper == "CONCAT" {
            out.push_str("CONCATENATE");
        } else {
            out.push_str(&upper);
        }
        return;
    }

    // Bare identifiers keep their case: cell references, named expressions
    // and sheet names (followed by `!`) must pass through unchanged. Only
    // the logical literals are rewritten into engine-dialect calls.
    if ident.eq_ignore_ascii_case("TRUE") {
        out.push_str("TRUE()");
    } else if ident.eq_ignore_ascii_case("FALSE") {
        out.push_str("FALSE()");
    } else {
        out.push_str(ident);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_names_are_uppercased() {
        assert_eq!(canonicalize_formula("sum(B2:B9)"), "SUM(B2:B9)");
        assert_eq!(canonicalize_formula("Round(A1;2)"), "ROUND(A1,2)");
    }

    #[test]
    fn concat_alias_is_rewritten() {
        assert_eq!(
            canonicalize_formula("CONCAT(A1,\"-\",B1)"),
            "CONCATENATE(A1,\"-\",B1)"
        );
        assert_eq!(canonicalize_formula("concat(A1)"), "CONCATENATE(A1)");
        // Only the call form is an alias.
        assert_eq!(canonicalize_formula("CONCAT+1"), "CONCAT+1");
    }

    #[test]
    fn bare_logical_literals_become_calls() {
        assert_eq!(canonicalize_formula("IF(A1,TRUE,false)"), "IF(A1,TRUE(),FALSE())");
        // Already-call forms stay put (idempotence).
        assert_eq!(canonicalize_formula("IF(A1,TRUE(),FALSE())"), "IF(A1,TRUE(),FALSE())");
    }

    #[test]
    fn quoted_content_is_untouched() {
        assert_eq!(
            canonicalize_formula("IF(A1=\"true; vrai\";\"x\";\"y\")"),
            "IF(A1=\"true; vrai\",\"x\",\"y\")"
        );
        assert_eq!(
            canonicalize_formula("'Plan d''action'!B3*taux"),
            "'Plan d''action'!B3*taux"
        );
    }

    #[test]
    fn references_and_names_keep_their_case() {
        assert_eq!(canonicalize_formula("a1+B2"), "a1+B2");
        assert_eq!(canonicalize_formula("taux_co2*B3"), "taux_co2*B3");
        assert_eq!(canonicalize_formula("Params!B3"), "Params!B3");
    }

    #[test]
    fn idempotent() {
        let once = canonicalize_formula("concat(true;Params!A1;\"a;b\")");
        assert_eq!(canonicalize_formula(&once), once);
    }
}
