#![no_main]

use libfuzzer_sys::fuzz_target;

/// Decoding is linear in the input; bound the blob size anyway so a single
/// iteration stays fast.
const MAX_INPUT_BYTES: usize = 64 * 1024;

fuzz_target!(|data: &[u8]| {
    let data = if data.len() > MAX_INPUT_BYTES {
        &data[..MAX_INPUT_BYTES]
    } else {
        data
    };

    // Arbitrary bytes must either fail cleanly or decode into a document the
    // encoder can re-emit. Canonical emission makes encode → decode → encode
    // a fixpoint; comparing bytes rather than documents keeps NaN payloads
    // (preserved bit-for-bit by the codec, never equal under `PartialEq`)
    // out of the comparison.
    let Ok(doc) = footprint_fwb::decode(data) else {
        return;
    };

    let first = footprint_fwb::encode(&doc).expect("decoded document must re-encode");
    let reread = footprint_fwb::decode(&first).expect("canonical bytes must decode");
    let second = footprint_fwb::encode(&reread).expect("re-decoded document must re-encode");
    assert_eq!(first, second, "re-encoding is not a fixpoint");
});
