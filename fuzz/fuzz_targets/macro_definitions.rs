#![no_main]

use libfuzzer_sys::fuzz_target;
use treepat::macros::MacroRegistry;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let mut registry = MacroRegistry::new();
    let _ = registry.load_definitions(text);
});
