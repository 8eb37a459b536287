#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = dian_fe::xades::verify_enveloped_digest(data);
});
