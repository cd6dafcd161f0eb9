use crate::{BooleanComparator, DiffError, ensure_pair};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Byte-for-byte comparison, like `cmp`.
#[derive(Debug)]
pub struct ExactDiff {
    identical: bool,
}

impl ExactDiff {
    pub fn new(candidate: &Path, reference: &Path) -> Result<Self, DiffError> {
        ensure_pair(candidate, reference)?;
        Ok(Self {
            identical: files_identical(candidate, reference)?,
        })
    }
}

impl BooleanComparator for ExactDiff {
    fn passed(&self) -> bool {
        self.identical
    }
}

/// Always passes. For outputs whose content legitimately varies between
/// runs; only their presence is checked.
#[derive(Debug)]
pub struct NullDiff;

impl NullDiff {
    pub fn new(candidate: &Path, reference: &Path) -> Result<Self, DiffError> {
        ensure_pair(candidate, reference)?;
        Ok(Self)
    }
}

impl BooleanComparator for NullDiff {
    fn passed(&self) -> bool {
        true
    }
}

fn open(path: &Path) -> Result<BufReader<File>, DiffError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| DiffError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn files_identical(a: &Path, b: &Path) -> Result<bool, DiffError> {
    let len = |p: &Path| {
        p.metadata().map(|m| m.len()).map_err(|source| DiffError::Io {
            path: p.to_path_buf(),
            source,
        })
    };
    if len(a)? != len(b)? {
        return Ok(false);
    }

    let mut ra = open(a)?;
    let mut rb = open(b)?;
    let mut buf_a = [0u8; 8192];
    let mut buf_b = [0u8; 8192];

    loop {
        let n = read_full(&mut ra, &mut buf_a, a)?;
        let m = read_full(&mut rb, &mut buf_b, b)?;
        if n != m || buf_a[..n] != buf_b[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` as far as the reader allows, so both sides advance in lockstep.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8], path: &Path) -> Result<usize, DiffError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(DiffError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
    }
    Ok(filled)
}
