#![no_main]

use libfuzzer_sys::fuzz_target;
use nrtest_diff::{Encoding, read_matrix};
use std::io::Write;

fuzz_target!(|data: &[u8]| {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(data).expect("write temp file");

    for encoding in [
        Encoding::Whitespace,
        Encoding::Delimited(','),
        Encoding::RawBinary,
    ] {
        if let Ok(m) = read_matrix(file.path(), encoding) {
            assert_eq!(m.values().len(), m.rows() * m.cols());
        }
    }
});
