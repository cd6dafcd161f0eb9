//! Numeric array comparators.

use crate::{DiffError, NumericComparator, ensure_pair};
use nrtest_domain::{
    Matrix, column_statistics_deviation, deviation_field, summarize_deviation,
};
use nrtest_types::Deviation;
use std::path::Path;

/// How a numeric output file is laid out on disk.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Encoding {
    /// Whitespace-separated text, one row per line.
    Whitespace,
    /// Text with a single-character delimiter, e.g. `,`.
    Delimited(char),
    /// Packed native-endian f64 with no header; read as one column.
    RawBinary,
}

/// Elementwise relative deviation of two arrays of identical shape.
#[derive(Debug)]
pub struct ArrayDiff {
    deviation: Deviation,
}

impl ArrayDiff {
    pub fn new(candidate: &Path, reference: &Path, encoding: Encoding) -> Result<Self, DiffError> {
        ensure_pair(candidate, reference)?;
        let c = read_matrix(candidate, encoding)?;
        let r = read_matrix(reference, encoding)?;
        let field = deviation_field(&c, &r)?;
        Ok(Self {
            deviation: summarize_deviation(&field),
        })
    }
}

impl NumericComparator for ArrayDiff {
    fn deviation(&self) -> Deviation {
        self.deviation
    }
}

/// Compares per-column mean and standard deviation, so two samplings of the
/// same distribution agree even when their rows differ.
#[derive(Debug)]
pub struct NtupleDiff {
    deviation: Deviation,
}

impl NtupleDiff {
    pub fn new(candidate: &Path, reference: &Path, encoding: Encoding) -> Result<Self, DiffError> {
        ensure_pair(candidate, reference)?;
        let c = read_matrix(candidate, encoding)?;
        let r = read_matrix(reference, encoding)?;
        let field = column_statistics_deviation(&c, &r)?;
        Ok(Self {
            deviation: summarize_deviation(&field),
        })
    }
}

impl NumericComparator for NtupleDiff {
    fn deviation(&self) -> Deviation {
        self.deviation
    }
}

/// Load a numeric file. Text encodings skip blank lines and drop anything
/// after a `#`.
pub fn read_matrix(path: &Path, encoding: Encoding) -> Result<Matrix, DiffError> {
    let bytes = std::fs::read(path).map_err(|source| DiffError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match encoding {
        Encoding::RawBinary => parse_binary(path, &bytes),
        Encoding::Whitespace => parse_text(path, &String::from_utf8_lossy(&bytes), None),
        Encoding::Delimited(d) => parse_text(path, &String::from_utf8_lossy(&bytes), Some(d)),
    }
}

fn parse_binary(path: &Path, bytes: &[u8]) -> Result<Matrix, DiffError> {
    const WIDTH: usize = std::mem::size_of::<f64>();
    if bytes.len() % WIDTH != 0 {
        return Err(DiffError::BinaryLength {
            path: path.to_path_buf(),
            len: bytes.len(),
        });
    }
    let values = bytes
        .chunks_exact(WIDTH)
        .map(|chunk| {
            let mut buf = [0u8; WIDTH];
            buf.copy_from_slice(chunk);
            f64::from_ne_bytes(buf)
        })
        .collect();
    Ok(Matrix::column_vector(values))
}

fn parse_text(path: &Path, text: &str, delimiter: Option<char>) -> Result<Matrix, DiffError> {
    let mut rows = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.split_once('#').map_or(raw, |(data, _)| data).trim();
        if line.is_empty() {
            continue;
        }

        let tokens: Vec<&str> = match delimiter {
            None => line.split_whitespace().collect(),
            Some(d) => line.split(d).map(str::trim).collect(),
        };

        let row = tokens
            .into_iter()
            .map(|tok| {
                tok.parse::<f64>().map_err(|_| DiffError::Parse {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    token: tok.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(row);
    }

    Matrix::from_rows(rows).map_err(|source| DiffError::Shape {
        path: path.to_path_buf(),
        source,
    })
}
