//! Scratch directories and artefact shuffling around a test run.

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Private working directory of one in-flight test. Removed on drop.
#[derive(Debug)]
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    pub fn new() -> anyhow::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("nrtest-")
            .tempdir()
            .context("Unable to open working directory")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory now, reporting failures instead of ignoring them.
    pub fn close(self) -> anyhow::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .with_context(|| format!("failed to remove {}", path.display()))
    }
}

/// Copy `src_root/rel` to `dst_root/rel`, creating parent directories.
pub fn copy_file_and_path(rel: &Path, src_root: &Path, dst_root: &Path) -> anyhow::Result<()> {
    let src = src_root.join(rel);
    let dst = dst_root.join(rel);
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::copy(&src, &dst)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dst.display()))?;
    Ok(())
}

/// Copy those of `rels` that exist under `src_root`; return the ones that
/// were not produced.
pub fn copy_produced<'a, I>(rels: I, src_root: &Path, dst_root: &Path) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut missing = Vec::new();
    for rel in rels {
        if src_root.join(rel).is_file() {
            copy_file_and_path(rel, src_root, dst_root)?;
        } else {
            missing.push(rel.to_path_buf());
        }
    }
    Ok(missing)
}

/// First of `needles` found in any of `logs`, searching log by log.
///
/// Plain substring search. Logs are decoded lossily so binary noise in
/// program output cannot hide a match.
pub fn find_fail_string<'a>(logs: &[&Path], needles: &'a [String]) -> anyhow::Result<Option<&'a str>> {
    if needles.is_empty() {
        return Ok(None);
    }
    for log in logs {
        let bytes = fs::read(log).with_context(|| format!("failed to read {}", log.display()))?;
        let text = String::from_utf8_lossy(&bytes);
        if let Some(hit) = needles.iter().find(|n| text.contains(n.as_str())) {
            return Ok(Some(hit.as_str()));
        }
    }
    Ok(None)
}
