//! Output-file comparators for nrtest.
//!
//! A comparator is built from a (candidate, reference) pair and yields
//! either a boolean verdict or a relative-deviation magnitude. Comparators
//! are looked up by string tag in an explicit [`Registry`]; there is no
//! global state and no fallback for unknown tags.

mod array;
mod duration;
mod exact;
mod registry;

pub use array::{ArrayDiff, Encoding, NtupleDiff, read_matrix};
pub use duration::DurationDiff;
pub use exact::{ExactDiff, NullDiff};
pub use registry::{Constructor, Registry};

use nrtest_domain::DomainError;
use nrtest_types::{Deviation, FileOutcome};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error("Unable to locate: \"{}\"", .0.display())]
    Missing(PathBuf),

    #[error("unknown comparator tag: {0:?}")]
    UnknownTag(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: cannot parse {token:?} as a number", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        token: String,
    },

    #[error("{}: {len} bytes is not a whole number of f64 values", path.display())]
    BinaryLength { path: PathBuf, len: usize },

    #[error("{}: {source}", path.display())]
    Shape {
        path: PathBuf,
        #[source]
        source: DomainError,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Pass/fail comparison.
pub trait BooleanComparator: fmt::Debug {
    fn passed(&self) -> bool;
}

/// Magnitude comparison; every value of the returned deviation is >= 0.
pub trait NumericComparator: fmt::Debug {
    fn deviation(&self) -> Deviation;
}

#[derive(Debug)]
pub enum Comparator {
    Boolean(Box<dyn BooleanComparator>),
    Numeric(Box<dyn NumericComparator>),
}

impl Comparator {
    pub fn outcome(&self) -> FileOutcome {
        match self {
            Comparator::Boolean(c) => FileOutcome::Boolean {
                passed: c.passed(),
            },
            Comparator::Numeric(c) => FileOutcome::Numeric {
                deviation: c.deviation(),
            },
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Comparator::Numeric(_))
    }
}

fn ensure_file(path: &Path) -> Result<(), DiffError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(DiffError::Missing(path.to_path_buf()))
    }
}

/// Both sides must exist before any comparator does work.
fn ensure_pair(candidate: &Path, reference: &Path) -> Result<(), DiffError> {
    ensure_file(candidate)?;
    ensure_file(reference)
}
