#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(report) = serde_json::from_slice::<nrtest_types::CompareReport>(data) {
        let _ = nrtest_app::render_markdown(&report);
        let _ = nrtest_app::github_annotations(&report);
    }
});
