#![no_main]

use libfuzzer_sys::fuzz_target;
use markup::{TreeParser, parse, to_markup};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    // Malformed close tags are an expected outcome, not a crash.
    let Ok(tree) = parse(input) else {
        return;
    };
    let printed = to_markup(&tree);
    let reparsed = parse(&printed).expect("printed markup reparses");
    // A declaration is hoisted to the front, which can join the text around it, so only
    // declaration-free documents must print back identically on the first pass.
    if tree.declaration().is_none() {
        assert_eq!(to_markup(&reparsed), printed);
    }

    // The same parser instance must come back clean after each document.
    let mut parser = TreeParser::new();
    for _ in 0..2 {
        if parser.feed(input).is_ok() {
            let again = parser.finalize().expect("finalize after clean feed");
            assert_eq!(to_markup(&again), printed);
        }
    }
});
