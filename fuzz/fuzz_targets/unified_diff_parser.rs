#![no_main]

use libfuzzer_sys::fuzz_target;

use decisionguard_diff::{parse_patch, parse_unified_diff};

fuzz_target!(|data: &[u8]| {
    let s = String::from_utf8_lossy(data);
    for file in parse_unified_diff(&s) {
        if let Some(patch) = file.patch.as_deref() {
            let _ = parse_patch(patch).added_text();
        }
    }
    let _ = parse_patch(&s);
});
