#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = toml::from_str::<nrtest_types::TestSpec>(s);
        let _ = toml::from_str::<nrtest_types::Application>(s);
        let _ = serde_json::from_str::<nrtest_types::TestSpec>(s);
    }
});
