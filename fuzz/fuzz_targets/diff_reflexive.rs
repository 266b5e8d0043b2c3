#![no_main]

use libfuzzer_sys::fuzz_target;
use markup::{diff, parse};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let (Ok(left), Ok(right)) = (parse(input), parse(input)) else {
        return;
    };
    assert!(diff(&left, &right).is_empty());
});
