// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for record decoding, validation and re-encoding

#![no_main]

use libfuzzer_sys::fuzz_target;
use tally_event::{decode, encode_record, validate_record};

fuzz_target!(|data: &[u8]| {
    let Ok(record) = decode(data) else {
        return;
    };

    // Validation must reject, never panic.
    let _ = validate_record(&record);

    // Whatever decoded must encode to exactly one line that decodes again
    // to the same map.
    let encoded = encode_record(&record).expect("encode of decoded record");
    assert_eq!(encoded.iter().filter(|&&b| b == b'\n').count(), 1);
    let again = decode(&encoded).expect("re-decode of encoded record");
    assert_eq!(again.keys().collect::<Vec<_>>(), record.keys().collect::<Vec<_>>());
});
