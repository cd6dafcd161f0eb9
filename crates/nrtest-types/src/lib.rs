//! Shared types for nrtest.
//!
//! Design goal: versioned, explicit, boring.
//! Declarations (`Application`, `TestSpec`) are read once and never mutated;
//! run results (`ExecutionResult`, `TestRecord`) and comparison results
//! (`CompareReport`) are fresh values keyed by test name.

mod magnitude;
mod version;

pub use version::{Version, VersionError};

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

pub const MANIFEST_SCHEMA_V1: &str = "nrtest.manifest.v1";
pub const COMPARE_SCHEMA_V1: &str = "nrtest.compare.v1";

pub const MANIFEST_FNAME: &str = "manifest.json";
pub const STDOUT_FNAME: &str = "stdout.log";
pub const STDERR_FNAME: &str = "stderr.log";
pub const PERFORMANCE_FNAME: &str = "performance.json";

/// Tag assigned to output files declared without one.
pub const NULL_TAG: &str = "null";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct HostInfo {
    pub os: String,
    pub arch: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

// ----------------------------
// Declarations
// ----------------------------

/// The software under test.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Application {
    pub name: String,

    /// Executable, optionally followed by fixed leading arguments
    /// (shell-word split, e.g. "mpirun -np 4 solver").
    pub exe: String,

    #[schemars(with = "String")]
    pub version: Version,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Bash script sourced to build the environment of every test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_script: Option<PathBuf>,

    /// Seconds after which a test is killed and considered failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

impl Application {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(secs_to_duration)
    }
}

/// Seconds too large for a `Duration` saturate instead of panicking.
fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// A single declared test.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TestSpec {
    pub name: String,

    /// Arguments passed verbatim to the executable.
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub version: Option<Version>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Tests requiring a newer application are dropped before execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub minimum_app_version: Option<Version>,

    /// Paths relative to the directory holding the test declaration.
    #[serde(default)]
    pub input_files: Vec<PathBuf>,

    /// Output path -> comparator tag. A null tag means [`NULL_TAG`].
    #[serde(default, deserialize_with = "deserialize_output_files")]
    #[schemars(with = "BTreeMap<String, Option<String>>")]
    pub output_files: BTreeMap<String, String>,

    /// Substrings that mark the test failed when found in stdout/stderr.
    #[serde(default)]
    pub fail_strings: Vec<String>,

    /// Per-test override of the application timeout, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

impl TestSpec {
    /// Test-level override, else the application default.
    pub fn effective_timeout(&self, app: &Application) -> Option<Duration> {
        self.timeout.map(secs_to_duration).or_else(|| app.timeout())
    }

    /// True when the application satisfies `minimum_app_version`.
    pub fn supports(&self, app_version: &Version) -> bool {
        self.minimum_app_version
            .as_ref()
            .is_none_or(|min| app_version >= min)
    }
}

fn deserialize_output_files<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, Option<String>> = BTreeMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(path, tag)| (path, tag.unwrap_or_else(|| NULL_TAG.to_string())))
        .collect())
}

// ----------------------------
// Execution results
// ----------------------------

/// One time-stamped telemetry point of a running process.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct PerformanceSample {
    /// Seconds since process start.
    pub time_s: f64,
    pub cpu_pct: f64,
    pub memory_mb: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_mb: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_mb: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ExecutionResult {
    /// Negative values are terminating signals (-11 is SIGSEGV).
    pub exit_code: i32,

    /// Wall-clock seconds; `None` iff the process was killed on timeout.
    pub duration_s: Option<f64>,

    /// Strictly increasing `time_s`.
    pub samples: Vec<PerformanceSample>,

    pub peak_memory_mb: f64,
}

impl ExecutionResult {
    pub fn timed_out(&self) -> bool {
        self.duration_s.is_none()
    }
}

// ----------------------------
// Benchmark manifest
// ----------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AppRecord {
    pub name: String,

    #[schemars(with = "String")]
    pub version: Version,

    #[serde(default)]
    pub description: Option<String>,
}

/// The subset of a test and its run needed for later comparison.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct TestRecord {
    pub name: String,

    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub version: Option<Version>,

    #[serde(default)]
    pub description: Option<String>,

    pub output_files: BTreeMap<String, String>,

    pub passed: bool,

    /// `None` on success.
    #[serde(default)]
    pub error_msg: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_s: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_memory_mb: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Manifest {
    pub schema: String,
    pub tool: ToolInfo,
    pub host: HostInfo,
    pub created_at: String,
    pub application: AppRecord,
    pub tests: Vec<TestRecord>,
}

// ----------------------------
// Comparison results
// ----------------------------

/// Summary of a relative-deviation field. All values are >= 0, possibly
/// infinite; non-finite values travel as strings.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct Deviation {
    #[serde(with = "magnitude")]
    #[schemars(with = "magnitude::Repr")]
    pub max: f64,

    #[serde(with = "magnitude")]
    #[schemars(with = "magnitude::Repr")]
    pub min: f64,

    #[serde(with = "magnitude")]
    #[schemars(with = "magnitude::Repr")]
    pub mean: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileOutcome {
    Boolean { passed: bool },
    Numeric { deviation: Deviation },
    Error { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct FileVerdict {
    pub file: String,
    pub tag: String,
    pub outcome: FileOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct TestVerdict {
    pub name: String,
    pub passed: bool,

    /// Maximum relative deviation across numeric comparators (0 if none).
    /// Infinite when a zero reference value met a nonzero one.
    #[serde(with = "magnitude")]
    #[schemars(with = "magnitude::Repr")]
    pub grade: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default)]
    pub files: Vec<FileVerdict>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub struct VerdictCounts {
    pub pass: u32,
    pub fail: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ManifestRef {
    pub path: String,
    pub app_name: String,
    pub app_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CompareReport {
    pub schema: String,
    pub tool: ToolInfo,
    pub tolerance: f64,
    pub sut: ManifestRef,
    pub benchmark: ManifestRef,
    pub passed: bool,
    pub counts: VerdictCounts,

    /// Sorted by test name.
    pub tests: Vec<TestVerdict>,

    /// Non-fatal observations, e.g. benchmark tests absent from the SUT.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
