//! Domain logic for nrtest.
//!
//! This crate is intentionally I/O-free: it does math and policy.

use nrtest_types::{Deviation, FileOutcome, FileVerdict, TestVerdict, VerdictCounts};
use statrs::statistics::Statistics;
use std::fmt;

/// Exit code reported for a child killed by SIGSEGV.
pub const SEGFAULT_EXIT_CODE: i32 = -11;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    #[error("inconsistent array shape: {candidate} vs {reference}")]
    ShapeMismatch { candidate: Shape, reference: Shape },

    #[error("arrays have different number of columns: {candidate} vs {reference}")]
    ColumnMismatch { candidate: usize, reference: usize },

    #[error("row {row} has {found} values, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("no rows to summarize")]
    NoRows,

    #[error("reference duration must be > 0, got {0}")]
    InvalidReference(f64),
}

/// Shape of a parsed numeric file, with single rows and single columns
/// collapsed to vectors.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Shape {
    Vector(usize),
    Matrix { rows: usize, cols: usize },
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Vector(n) => write!(f, "({n},)"),
            Shape::Matrix { rows, cols } => write!(f, "({rows}, {cols})"),
        }
    }
}

/// Dense row-major matrix of f64.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl Matrix {
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, DomainError> {
        let cols = rows.first().map_or(0, Vec::len);
        let n_rows = rows.len();
        let mut values = Vec::with_capacity(n_rows * cols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != cols {
                return Err(DomainError::RaggedRows {
                    row: i + 1,
                    expected: cols,
                    found: row.len(),
                });
            }
            values.extend(row);
        }
        Ok(Self {
            rows: n_rows,
            cols,
            values,
        })
    }

    /// A single column holding `values`.
    pub fn column_vector(values: Vec<f64>) -> Self {
        Self {
            rows: values.len(),
            cols: 1,
            values,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn shape(&self) -> Shape {
        if self.rows == 1 {
            Shape::Vector(self.cols)
        } else if self.cols == 1 || self.rows == 0 {
            Shape::Vector(self.rows)
        } else {
            Shape::Matrix {
                rows: self.rows,
                cols: self.cols,
            }
        }
    }

    fn column(&self, j: usize) -> impl Iterator<Item = &f64> {
        self.values.iter().skip(j).step_by(self.cols.max(1))
    }
}

/// `|candidate - reference| / |reference|`, defined as 0 when both are 0.
pub fn relative_deviation(candidate: f64, reference: f64) -> f64 {
    if candidate == 0.0 && reference == 0.0 {
        0.0
    } else {
        ((candidate - reference) / reference).abs()
    }
}

/// Elementwise relative deviation of two equally shaped matrices.
///
/// A shape mismatch is an error, never a large deviation.
pub fn deviation_field(candidate: &Matrix, reference: &Matrix) -> Result<Vec<f64>, DomainError> {
    if candidate.shape() != reference.shape() {
        return Err(DomainError::ShapeMismatch {
            candidate: candidate.shape(),
            reference: reference.shape(),
        });
    }
    Ok(pairwise(candidate.values(), reference.values()))
}

fn pairwise(candidate: &[f64], reference: &[f64]) -> Vec<f64> {
    candidate
        .iter()
        .zip(reference)
        .map(|(c, r)| relative_deviation(*c, *r))
        .collect()
}

/// Max/min/mean of a deviation field. An empty field summarizes to zeros.
pub fn summarize_deviation(field: &[f64]) -> Deviation {
    if field.is_empty() {
        return Deviation::default();
    }
    let mut max = field[0];
    let mut min = field[0];
    let mut sum = 0.0;
    for &d in field {
        // NaN must survive into max so that it can never pass a tolerance.
        if d > max || d.is_nan() {
            max = d;
        }
        if d < min {
            min = d;
        }
        sum += d;
    }
    Deviation {
        max,
        min,
        mean: sum / field.len() as f64,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStats {
    pub mean: Vec<f64>,
    pub std_dev: Vec<f64>,
}

/// Per-column mean and population standard deviation.
pub fn column_statistics(m: &Matrix) -> Result<ColumnStats, DomainError> {
    if m.rows() == 0 {
        return Err(DomainError::NoRows);
    }
    let mean = (0..m.cols()).map(|j| m.column(j).mean()).collect();
    let std_dev = (0..m.cols())
        .map(|j| m.column(j).population_std_dev())
        .collect();
    Ok(ColumnStats { mean, std_dev })
}

/// Relative deviation of column means followed by that of column standard
/// deviations. Row order and row count do not matter, only column count.
pub fn column_statistics_deviation(
    candidate: &Matrix,
    reference: &Matrix,
) -> Result<Vec<f64>, DomainError> {
    if candidate.cols() != reference.cols() {
        return Err(DomainError::ColumnMismatch {
            candidate: candidate.cols(),
            reference: reference.cols(),
        });
    }
    let c = column_statistics(candidate)?;
    let r = column_statistics(reference)?;

    let mut field = pairwise(&c.mean, &r.mean);
    field.extend(pairwise(&c.std_dev, &r.std_dev));
    Ok(field)
}

/// One-sided duration regression: only a slowdown counts.
pub fn duration_deviation(candidate: f64, reference: f64) -> Result<f64, DomainError> {
    if reference.is_nan() || reference <= 0.0 || reference.is_infinite() {
        return Err(DomainError::InvalidReference(reference));
    }
    Ok(((candidate - reference) / reference).max(0.0))
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExecutionFailure {
    TimedOut,
    SegmentationFault,
    NonZeroExit(i32),
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionFailure::TimedOut => f.write_str("Program timed out"),
            ExecutionFailure::SegmentationFault => f.write_str("Segmentation fault"),
            ExecutionFailure::NonZeroExit(code) => write!(f, "Non-zero exit code ({code})"),
        }
    }
}

/// Classify a finished process. A missing duration means timeout whatever
/// the exit code.
pub fn classify_exit(exit_code: i32, duration_s: Option<f64>) -> Option<ExecutionFailure> {
    if duration_s.is_none() {
        Some(ExecutionFailure::TimedOut)
    } else if exit_code == SEGFAULT_EXIT_CODE {
        Some(ExecutionFailure::SegmentationFault)
    } else if exit_code != 0 {
        Some(ExecutionFailure::NonZeroExit(exit_code))
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestJudgement {
    pub passed: bool,
    pub grade: f64,
    pub reason: Option<String>,
}

/// Aggregate per-file outcomes into a test verdict.
///
/// Passes iff no file errored, every boolean comparator passed, and the
/// grade (max numeric deviation) is within `tolerance`.
pub fn judge_files(files: &[FileVerdict], tolerance: f64) -> TestJudgement {
    let mut grade = 0.0_f64;
    let mut worst_file: Option<&str> = None;
    let mut reason: Option<String> = None;

    for f in files {
        match &f.outcome {
            FileOutcome::Boolean { passed: true } => {}
            FileOutcome::Boolean { passed: false } => {
                reason.get_or_insert_with(|| format!("{}: diff failed", f.file));
            }
            FileOutcome::Error { reason: why } => {
                reason.get_or_insert_with(|| format!("{}: {why}", f.file));
            }
            FileOutcome::Numeric { deviation } => {
                if deviation.max > grade || deviation.max.is_nan() {
                    grade = deviation.max;
                    worst_file = Some(&f.file);
                }
            }
        }
    }

    let within = grade <= tolerance;
    if reason.is_none() && !within {
        reason = Some(format!(
            "{}: deviation {} exceeds tolerance {}",
            worst_file.unwrap_or("?"),
            format_pct(grade),
            format_pct(tolerance)
        ));
    }

    TestJudgement {
        passed: reason.is_none(),
        grade,
        reason,
    }
}

/// Logical AND across tests, plus counts.
pub fn suite_verdict(tests: &[TestVerdict]) -> (bool, VerdictCounts) {
    let mut counts = VerdictCounts::default();
    for t in tests {
        if t.passed {
            counts.pass += 1;
        } else {
            counts.fail += 1;
        }
    }
    (counts.fail == 0, counts)
}

pub fn format_pct(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}
