#![no_main]

use libfuzzer_sys::fuzz_target;
use treepat::compiler::{CompileOptions, compile};
use treepat::macros::MacroRegistry;
use treepat::matcher::{Bindings, find_matches};
use treepat::notation::{parse_pattern, parse_subject};

// Any wildcard-free tree used as a pattern must match itself.
fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(subject) = parse_subject(source) else {
        return;
    };
    let Ok(pattern) = parse_pattern(source) else {
        return;
    };
    let registry = MacroRegistry::new();
    let Ok(bundle) = compile(&pattern, &registry, &CompileOptions::default()) else {
        return;
    };
    assert!(!find_matches(&bundle, &registry, &subject, true, Bindings::new()).is_empty());
});
