#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Errors are fine, panics are bugs. Canonical output is a fixed point.
    if let Ok(once) = dian_fe::ubl::canonicalize(data) {
        if let Ok(twice) = dian_fe::ubl::canonicalize(&once) {
            assert_eq!(once, twice);
        }
    }
});
