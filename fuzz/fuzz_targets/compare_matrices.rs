#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use nrtest_domain::{Matrix, column_statistics_deviation, deviation_field, summarize_deviation};

#[derive(Debug, Arbitrary)]
struct Input {
    cols: u8,
    candidate: Vec<f64>,
    reference: Vec<f64>,
}

fn to_matrix(values: &[f64], cols: usize) -> Option<Matrix> {
    let rows = values.chunks_exact(cols).map(<[f64]>::to_vec).collect();
    Matrix::from_rows(rows).ok()
}

fuzz_target!(|input: Input| {
    let cols = usize::from(input.cols % 8) + 1;
    let (Some(c), Some(r)) = (
        to_matrix(&input.candidate, cols),
        to_matrix(&input.reference, cols),
    ) else {
        return;
    };

    if let Ok(field) = deviation_field(&c, &r) {
        let d = summarize_deviation(&field);
        if field.iter().all(|v| v.is_finite()) {
            assert!(d.min <= d.max);
        }
    }
    let _ = column_statistics_deviation(&c, &r);
});
