//! Loading application and test declarations.
//!
//! Documents are JSON unless the file ends in `.toml`. Unknown fields are
//! rejected by the types themselves.

use nrtest_types::{Application, TestSpec};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("{}: name must not be empty", path.display())]
    EmptyName { path: PathBuf },

    #[error("{}: timeout must be a positive, representable number of seconds, got {value}", path.display())]
    InvalidTimeout { path: PathBuf, value: f64 },

    #[error("{}: exe must not be empty", path.display())]
    EmptyExe { path: PathBuf },

    #[error("invalid glob pattern {pattern:?}: {message}")]
    Pattern { pattern: String, message: String },

    #[error("no test configuration matches {0:?}")]
    NoMatch(String),
}

/// A test declaration together with where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTest {
    pub spec: TestSpec,
    /// Directory holding the declaration; input files are relative to it.
    pub input_dir: PathBuf,
    pub source: PathBuf,
}

pub fn load_application(path: &Path) -> Result<Application, ConfigError> {
    let mut app: Application = read_document(path)?;

    if app.name.trim().is_empty() {
        return Err(ConfigError::EmptyName {
            path: path.to_path_buf(),
        });
    }
    if app.exe.trim().is_empty() {
        return Err(ConfigError::EmptyExe {
            path: path.to_path_buf(),
        });
    }
    check_timeout(path, app.timeout)?;

    if let Some(script) = app.setup_script.take() {
        let base = config_dir(path)?;
        app.setup_script = Some(resolve_relative(&expand_tilde(&script), &base));
    }
    Ok(app)
}

pub fn load_test(path: &Path) -> Result<LoadedTest, ConfigError> {
    let spec: TestSpec = read_document(path)?;

    if spec.name.trim().is_empty() {
        return Err(ConfigError::EmptyName {
            path: path.to_path_buf(),
        });
    }
    check_timeout(path, spec.timeout)?;

    Ok(LoadedTest {
        spec,
        input_dir: config_dir(path)?,
        source: path.to_path_buf(),
    })
}

/// Expand literal paths and glob patterns into a sorted, deduplicated list.
pub fn expand_test_configs(patterns: &[String]) -> Result<Vec<PathBuf>, ConfigError> {
    let mut out = Vec::new();
    for pattern in patterns {
        if !pattern.contains(['*', '?', '[']) {
            out.push(PathBuf::from(pattern));
            continue;
        }
        let matches = glob::glob(pattern).map_err(|e| ConfigError::Pattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        let before = out.len();
        out.extend(matches.filter_map(Result::ok).filter(|p| p.is_file()));
        if out.len() == before {
            return Err(ConfigError::NoMatch(pattern.clone()));
        }
    }
    out.sort();
    out.dedup();
    Ok(out)
}

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^-\w.]").expect("slug pattern is valid"));

/// Filesystem-friendly form of a test name: trimmed, spaces to `_`, and
/// anything other than word characters, `-` and `.` removed.
pub fn slugify(name: &str) -> String {
    let spaced = name.trim().replace(' ', "_");
    UNSAFE_CHARS.replace_all(&spaced, "").into_owned()
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_err = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
    if is_toml {
        toml::from_str(&text).map_err(|e| parse_err(e.to_string()))
    } else {
        serde_json::from_str(&text).map_err(|e| parse_err(e.to_string()))
    }
}

fn check_timeout(path: &Path, timeout: Option<f64>) -> Result<(), ConfigError> {
    match timeout {
        Some(value) if value <= 0.0 || Duration::try_from_secs_f64(value).is_err() => {
            Err(ConfigError::InvalidTimeout {
                path: path.to_path_buf(),
                value,
            })
        }
        _ => Ok(()),
    }
}

fn config_dir(path: &Path) -> Result<PathBuf, ConfigError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::path::absolute(parent).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

fn resolve_relative(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
