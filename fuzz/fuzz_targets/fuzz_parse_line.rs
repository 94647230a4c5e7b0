#![no_main]
use libfuzzer_sys::fuzz_target;

use scalelog::parser::{decode_line, parse_value, ValuePattern};

fuzz_target!(|data: &[u8]| {
    let Some(line) = decode_line(data) else {
        return;
    };
    if let Some(value) = parse_value(&line, &ValuePattern::default()) {
        assert!(value.is_finite());
    }
});
