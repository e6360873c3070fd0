#![no_main]

use libfuzzer_sys::fuzz_target;

/// Keep the harness itself bounded.
///
/// The parser caps expression nesting internally but has no input length limit, so the harness
/// avoids passing arbitrarily-large inputs into lossy UTF-8 conversion / tokenization.
const MAX_FUZZ_FORMULA_CHARS: usize = 8_192;
const MAX_INPUT_BYTES: usize = MAX_FUZZ_FORMULA_CHARS * 4; // max UTF-8 bytes per char

fn truncate_to_chars(s: &str, max_chars: usize) -> &str {
    let mut count = 0usize;
    for (idx, _) in s.char_indices() {
        if count == max_chars {
            return &s[..idx];
        }
        count += 1;
    }
    s
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // Avoid extremely large allocations even before we reach the parser.
    let data = if data.len() > MAX_INPUT_BYTES {
        &data[..MAX_INPUT_BYTES]
    } else {
        data
    };

    // Accept arbitrary bytes as input; treat invalid UTF-8 lossy.
    let input = String::from_utf8_lossy(data);
    let formula = truncate_to_chars(&input, MAX_FUZZ_FORMULA_CHARS);

    if let Ok(parsed) = footprint_engine::parse_formula(formula) {
        // Sheet-name mapping is the one structural pass every stored formula
        // goes through before evaluation; it must hold up on anything that
        // parses.
        let _ = parsed.map_sheets(&mut |name: String| name.len());
    }

    // Exercise the decoder's dialect rewrite too. It documents idempotence:
    // re-canonicalizing its own output must change nothing.
    let canonical = footprint_fwb::canonicalize_formula(formula);
    assert_eq!(footprint_fwb::canonicalize_formula(&canonical), canonical);
    let _ = footprint_engine::parse_formula(&canonical);
});
