#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(manifest) = serde_json::from_slice::<nrtest_types::Manifest>(data) {
        // Whatever parses must serialize again.
        let _ = serde_json::to_vec(&manifest).expect("manifest re-serializes");
    }
});
