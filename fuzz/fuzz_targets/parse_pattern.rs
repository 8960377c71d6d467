#![no_main]

use libfuzzer_sys::fuzz_target;
use treepat::compiler::{CompileOptions, compile};
use treepat::macros::MacroRegistry;
use treepat::notation::parse_pattern;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(pattern) = parse_pattern(source) {
        let _ = compile(&pattern, &MacroRegistry::new(), &CompileOptions::default());
    }
});
