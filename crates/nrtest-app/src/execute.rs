//! Running a suite of tests and recording a benchmark.
//!
//! 1. Drop tests the application is too old for
//! 2. Validate the suite (setup script, executable, inputs, tags, output dir)
//! 3. Run each test in sequence, isolated in a scratch directory
//! 4. Write `manifest.json`

use crate::Clock;
use crate::config::{LoadedTest, slugify};
use anyhow::{Context, bail};
use nrtest_adapters::{
    AdapterError, CommandSpec, EnvResolver, HostProbe, ProcessRunner, Scratch,
    copy_file_and_path, copy_produced, find_executable, find_fail_string, write_json,
};
use nrtest_diff::Registry;
use nrtest_domain::{ExecutionFailure, classify_exit};
use nrtest_types::{
    AppRecord, Application, ExecutionResult, MANIFEST_FNAME, MANIFEST_SCHEMA_V1, Manifest,
    PERFORMANCE_FNAME, STDERR_FNAME, STDOUT_FNAME, TestRecord, TestSpec, ToolInfo,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    pub app: Application,
    pub tests: Vec<LoadedTest>,

    /// Must not exist yet; created during validation.
    pub benchmark_dir: PathBuf,

    pub tool: ToolInfo,

    /// Set from outside (e.g. Ctrl-C) to stop before the next test.
    pub cancel: Arc<AtomicBool>,
}

#[derive(Debug, Clone)]
pub struct ExecuteOutcome {
    pub manifest: Manifest,
    pub manifest_path: PathBuf,

    /// Names of tests dropped by the version gate.
    pub skipped: Vec<String>,

    /// True if the run stopped early on request.
    pub cancelled: bool,

    /// True if any executed test failed.
    pub failed: bool,
}

/// Why a single test failed. Caught at the test boundary and recorded.
#[derive(Debug, thiserror::Error)]
pub enum TestFailure {
    #[error("Input file not found: \"{}\"", .0.display())]
    MissingInput(PathBuf),

    #[error("Output already exists: \"{}\"", .0.display())]
    StaleOutput(PathBuf),

    #[error("Unable to open working directory")]
    Workspace(#[source] anyhow::Error),

    #[error("{0}")]
    Launch(#[source] AdapterError),

    #[error("{0}")]
    Execution(ExecutionFailure),

    #[error("Failure string found in log: \"{0}\"")]
    FailString(String),

    #[error("Output file not generated: \"{0}\"")]
    MissingOutput(String),

    #[error("{0:#}")]
    Io(#[from] anyhow::Error),
}

pub struct ExecuteSuiteUseCase<R: ProcessRunner, E: EnvResolver, H: HostProbe, C: Clock> {
    runner: R,
    env: E,
    host_probe: H,
    clock: C,
    registry: Registry,
}

/// What validation established about the suite.
struct Prepared {
    argv_prefix: Vec<String>,
    tests: Vec<(LoadedTest, PathBuf)>,
}

impl<R: ProcessRunner, E: EnvResolver, H: HostProbe, C: Clock> ExecuteSuiteUseCase<R, E, H, C> {
    pub fn new(runner: R, env: E, host_probe: H, clock: C, registry: Registry) -> Self {
        Self {
            runner,
            env,
            host_probe,
            clock,
            registry,
        }
    }

    pub fn execute(&self, req: ExecuteRequest) -> anyhow::Result<ExecuteOutcome> {
        let (tests, skipped) = version_gate(&req.app, req.tests);
        let prepared = self.validate(&req.app, tests, &req.benchmark_dir)?;

        let created_at = self.clock.now_rfc3339();
        let mut records = Vec::with_capacity(prepared.tests.len());
        let mut cancelled = false;

        for (test, output_dir) in &prepared.tests {
            if req.cancel.load(Ordering::SeqCst) {
                warn!("interrupted, skipping remaining tests");
                cancelled = true;
                break;
            }
            let record = self.run_test(&req.app, &prepared.argv_prefix, test, output_dir)?;
            records.push(record);
        }

        let failed = records.iter().any(|r| !r.passed);
        let manifest = Manifest {
            schema: MANIFEST_SCHEMA_V1.to_string(),
            tool: req.tool,
            host: self.host_probe.probe(),
            created_at,
            application: AppRecord {
                name: req.app.name.clone(),
                version: req.app.version.clone(),
                description: req.app.description.clone(),
            },
            tests: records,
        };

        let manifest_path = req.benchmark_dir.join(MANIFEST_FNAME);
        write_json(&manifest_path, &manifest, true)?;

        Ok(ExecuteOutcome {
            manifest,
            manifest_path,
            skipped,
            cancelled,
            failed,
        })
    }

    /// Suite-level preconditions. Any failure aborts before a test runs.
    fn validate(
        &self,
        app: &Application,
        mut tests: Vec<LoadedTest>,
        benchmark_dir: &Path,
    ) -> anyhow::Result<Prepared> {
        if let Some(script) = &app.setup_script
            && !script.is_file()
        {
            bail!("Unable to find setup script: \"{}\"", script.display());
        }

        let env = self.env.resolve(app.setup_script.as_deref())?;
        let mut argv_prefix = shell_words::split(&app.exe)
            .with_context(|| format!("invalid exe: {:?}", app.exe))?;
        let Some(program) = argv_prefix.first_mut() else {
            bail!("exe must not be empty");
        };
        let cwd = std::env::current_dir().context("current dir")?;
        let found = find_executable(program, env.get("PATH").map(String::as_str), &cwd)
            .with_context(|| format!("Unable to find executable: \"{program}\""))?;
        *program = found.to_string_lossy().into_owned();

        tests.sort_by(|a, b| a.spec.name.cmp(&b.spec.name));

        let mut seen: BTreeMap<String, &str> = BTreeMap::new();
        for t in &tests {
            if !t.input_dir.is_dir() {
                bail!("Input directory not found: \"{}\"", t.input_dir.display());
            }
            for f in &t.spec.input_files {
                let p = t.input_dir.join(f);
                if !p.is_file() {
                    bail!("{}: Input file not found: \"{}\"", t.spec.name, p.display());
                }
            }
            let slug = slugify(&t.spec.name);
            if let Some(other) = seen.insert(slug.clone(), &t.spec.name) {
                bail!(
                    "tests {other:?} and {:?} share output directory {slug:?}",
                    t.spec.name
                );
            }
        }

        let unknown = self.registry.unresolved(
            tests
                .iter()
                .flat_map(|t| t.spec.output_files.values().map(String::as_str)),
        );
        if !unknown.is_empty() {
            bail!("unknown comparator tag(s): {}", unknown.join(", "));
        }

        if benchmark_dir.exists() {
            bail!(
                "Benchmark directory already exists: \"{}\"",
                benchmark_dir.display()
            );
        }
        std::fs::create_dir_all(benchmark_dir)
            .with_context(|| format!("create dir {}", benchmark_dir.display()))?;

        let tests = tests
            .into_iter()
            .map(|t| {
                let out = benchmark_dir.join(slugify(&t.spec.name));
                (t, out)
            })
            .collect();

        Ok(Prepared { argv_prefix, tests })
    }

    /// Run one test. Per-test failures become a failed record; only a setup
    /// error (environment resolution) escapes.
    fn run_test(
        &self,
        app: &Application,
        argv_prefix: &[String],
        test: &LoadedTest,
        output_dir: &Path,
    ) -> anyhow::Result<TestRecord> {
        let spec = &test.spec;
        let mut result = None;

        let outcome = self.try_run_test(app, argv_prefix, test, output_dir, &mut result);
        let error_msg = match outcome {
            Ok(()) => None,
            Err(RunError::Setup(e)) => return Err(e),
            Err(RunError::Test(f)) => Some(f.to_string()),
        };

        match &error_msg {
            None => {
                let shown = result
                    .as_ref()
                    .and_then(|r| r.duration_s)
                    .map(human_duration)
                    .unwrap_or_default();
                info!(test = %spec.name, duration = %shown, "pass");
            }
            Some(msg) => info!(test = %spec.name, reason = %msg, "fail"),
        }

        Ok(project(spec, error_msg, result.as_ref()))
    }

    fn try_run_test(
        &self,
        app: &Application,
        argv_prefix: &[String],
        test: &LoadedTest,
        output_dir: &Path,
        result: &mut Option<ExecutionResult>,
    ) -> Result<(), RunError> {
        let spec = &test.spec;
        precheck(test, output_dir)?;

        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("create dir {}", output_dir.display()))
            .map_err(TestFailure::Io)?;

        let scratch = Scratch::new().map_err(TestFailure::Workspace)?;
        let run = self.run_in(app, argv_prefix, test, output_dir, &scratch);
        if let Err(e) = scratch.close() {
            warn!(test = %spec.name, error = %format!("{e:#}"), "scratch cleanup failed");
        }
        let run = run?;

        write_json(&output_dir.join(PERFORMANCE_FNAME), &run, true).map_err(TestFailure::Io)?;
        let exit = classify_exit(run.exit_code, run.duration_s);
        *result = Some(run);

        if let Some(failure) = exit {
            return Err(TestFailure::Execution(failure).into());
        }

        let logs = [
            output_dir.join(STDOUT_FNAME),
            output_dir.join(STDERR_FNAME),
        ];
        let logs: Vec<&Path> = logs.iter().map(PathBuf::as_path).collect();
        if let Some(hit) = find_fail_string(&logs, &spec.fail_strings).map_err(TestFailure::Io)? {
            return Err(TestFailure::FailString(hit.to_string()).into());
        }

        for file in spec.output_files.keys() {
            if !output_dir.join(file).is_file() {
                return Err(TestFailure::MissingOutput(file.clone()).into());
            }
        }
        Ok(())
    }

    /// Everything that happens inside the scratch directory.
    fn run_in(
        &self,
        app: &Application,
        argv_prefix: &[String],
        test: &LoadedTest,
        output_dir: &Path,
        scratch: &Scratch,
    ) -> Result<ExecutionResult, RunError> {
        let spec = &test.spec;
        for f in &spec.input_files {
            copy_file_and_path(f, &test.input_dir, scratch.path()).map_err(TestFailure::Io)?;
        }

        let env = self
            .env
            .resolve(app.setup_script.as_deref())
            .map_err(|e| RunError::Setup(e.into()))?;

        let mut argv = argv_prefix.to_vec();
        argv.extend(spec.args.iter().cloned());

        let cmd = CommandSpec {
            argv,
            cwd: scratch.path().to_path_buf(),
            env: Some(env),
            stdout: output_dir.join(STDOUT_FNAME),
            stderr: output_dir.join(STDERR_FNAME),
            timeout: spec.effective_timeout(app),
        };
        debug!(test = %spec.name, argv = ?cmd.argv, timeout = ?cmd.timeout, "running");

        let run = self.runner.run(&cmd).map_err(TestFailure::Launch)?;

        let missing = copy_produced(
            spec.output_files.keys().map(Path::new),
            scratch.path(),
            output_dir,
        )
        .map_err(TestFailure::Io)?;
        for m in missing {
            debug!(test = %spec.name, file = %m.display(), "output not produced");
        }
        Ok(run)
    }
}

/// Wall-clock seconds for log lines, rounded to the millisecond.
fn human_duration(secs: f64) -> String {
    let millis = Duration::from_millis((secs * 1000.0).round() as u64);
    humantime::format_duration(millis).to_string()
}

enum RunError {
    Setup(anyhow::Error),
    Test(TestFailure),
}

impl From<TestFailure> for RunError {
    fn from(f: TestFailure) -> Self {
        RunError::Test(f)
    }
}

fn precheck(test: &LoadedTest, output_dir: &Path) -> Result<(), TestFailure> {
    for f in &test.spec.input_files {
        let p = test.input_dir.join(f);
        if !p.is_file() {
            return Err(TestFailure::MissingInput(p));
        }
    }

    let produced = test
        .spec
        .output_files
        .keys()
        .map(String::as_str)
        .chain([STDOUT_FNAME, STDERR_FNAME, PERFORMANCE_FNAME]);
    for f in produced {
        let p = output_dir.join(f);
        if p.exists() {
            return Err(TestFailure::StaleOutput(p));
        }
    }
    Ok(())
}

/// Split off tests whose `minimum_app_version` the application does not meet.
pub fn version_gate(app: &Application, tests: Vec<LoadedTest>) -> (Vec<LoadedTest>, Vec<String>) {
    let (keep, drop): (Vec<_>, Vec<_>) = tests
        .into_iter()
        .partition(|t| t.spec.supports(&app.version));
    let skipped = drop
        .into_iter()
        .map(|t| {
            info!(test = %t.spec.name, app_version = %app.version, "skipped: requires newer application");
            t.spec.name
        })
        .collect();
    (keep, skipped)
}

/// Reduce a test and its run to what later comparison needs.
pub fn project(
    spec: &TestSpec,
    error_msg: Option<String>,
    result: Option<&ExecutionResult>,
) -> TestRecord {
    TestRecord {
        name: spec.name.clone(),
        version: spec.version.clone(),
        description: spec.description.clone(),
        output_files: spec.output_files.clone(),
        passed: error_msg.is_none(),
        error_msg,
        duration_s: result.and_then(|r| r.duration_s),
        peak_memory_mb: result.map(|r| r.peak_memory_mb),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SystemClock;
    use nrtest_adapters::{Environment, StdHostProbe, ambient};
    use nrtest_types::{HostInfo, PerformanceSample, Version};
    use std::cell::RefCell;
    use std::fs;

    /// Plays back canned behaviour instead of spawning processes.
    struct FakeRunner {
        /// Files written into the working directory, by test argument.
        outputs: Vec<(String, String)>,
        stdout: String,
        exit_code: i32,
        duration_s: Option<f64>,
        /// Fail as if the executable could not be started.
        spawn_fails: bool,
        seen: RefCell<Vec<CommandSpec>>,
    }

    impl FakeRunner {
        fn ok() -> Self {
            Self {
                outputs: vec![],
                stdout: "done\n".into(),
                exit_code: 0,
                duration_s: Some(1.5),
                spawn_fails: false,
                seen: RefCell::new(vec![]),
            }
        }
    }

    impl ProcessRunner for FakeRunner {
        fn run(&self, spec: &CommandSpec) -> Result<ExecutionResult, AdapterError> {
            if self.spawn_fails {
                assert!(spec.cwd.is_dir());
                fs::write(spec.cwd.join("partial.tmp"), "x").unwrap();
                self.seen.borrow_mut().push(spec.clone());
                return Err(AdapterError::Spawn {
                    argv: spec.argv.clone(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            fs::write(&spec.stdout, &self.stdout).unwrap();
            fs::write(&spec.stderr, "").unwrap();
            for (name, body) in &self.outputs {
                fs::write(spec.cwd.join(name), body).unwrap();
            }
            self.seen.borrow_mut().push(spec.clone());
            Ok(ExecutionResult {
                exit_code: self.exit_code,
                duration_s: self.duration_s,
                samples: vec![PerformanceSample {
                    time_s: 1.0,
                    cpu_pct: 99.0,
                    memory_mb: 12.0,
                    read_mb: None,
                    write_mb: None,
                }],
                peak_memory_mb: 12.0,
            })
        }
    }

    struct FixedEnv(Environment);

    impl EnvResolver for FixedEnv {
        fn resolve(&self, _script: Option<&Path>) -> Result<Environment, AdapterError> {
            Ok(self.0.clone())
        }
    }

    struct FixedHost;

    impl HostProbe for FixedHost {
        fn probe(&self) -> HostInfo {
            HostInfo {
                os: "linux".into(),
                arch: "x86_64".into(),
                cpu_count: Some(4),
                hostname: None,
            }
        }
    }

    fn app() -> Application {
        Application {
            name: "solver".into(),
            exe: "sh -e".into(),
            version: Version::new(1, 2, 0),
            description: None,
            setup_script: None,
            timeout: None,
        }
    }

    fn test_in(dir: &Path, json: &str) -> LoadedTest {
        LoadedTest {
            spec: serde_json::from_str(json).unwrap(),
            input_dir: dir.to_path_buf(),
            source: dir.join("test.json"),
        }
    }

    fn request(tests: Vec<LoadedTest>, out: PathBuf) -> ExecuteRequest {
        ExecuteRequest {
            app: app(),
            tests,
            benchmark_dir: out,
            tool: ToolInfo {
                name: "nrtest".into(),
                version: "0.0.0".into(),
            },
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    fn usecase(runner: FakeRunner) -> ExecuteSuiteUseCase<FakeRunner, FixedEnv, FixedHost, SystemClock> {
        ExecuteSuiteUseCase::new(
            runner,
            FixedEnv(ambient()),
            FixedHost,
            SystemClock,
            Registry::with_builtins(),
        )
    }

    #[cfg(unix)]
    #[test]
    fn passing_test_is_recorded_with_artefacts() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("in.dat"), "1 2 3").unwrap();
        let t = test_in(
            src.path(),
            r#"{"name": "heat 1", "args": ["in.dat"], "input_files": ["in.dat"],
                "output_files": {"out.dat": "array", "run.log": null}}"#,
        );

        let mut runner = FakeRunner::ok();
        runner.outputs = vec![
            ("out.dat".into(), "1 2 3".into()),
            ("run.log".into(), "t=0".into()),
        ];
        let uc = usecase(runner);

        let root = tempfile::tempdir().unwrap();
        let bench = root.path().join("bench");
        let outcome = uc.execute(request(vec![t], bench.clone())).unwrap();

        assert!(!outcome.failed);
        let rec = &outcome.manifest.tests[0];
        assert!(rec.passed, "{:?}", rec.error_msg);
        assert_eq!(rec.duration_s, Some(1.5));
        assert_eq!(rec.output_files["run.log"], "null");

        let out = bench.join("heat_1");
        assert!(out.join("out.dat").is_file());
        assert!(out.join(STDOUT_FNAME).is_file());
        assert!(out.join(PERFORMANCE_FNAME).is_file());
        assert!(outcome.manifest_path.is_file());

        let seen = uc.runner.seen.borrow();
        assert!(seen[0].argv[0].ends_with("/sh"));
        assert_eq!(&seen[0].argv[1..], &["-e".to_string(), "in.dat".to_string()]);
        assert!(!seen[0].cwd.exists(), "scratch dir must be removed");
    }

    #[test]
    fn durations_are_logged_to_the_millisecond() {
        assert_eq!(human_duration(0.4), "400ms");
        assert_eq!(human_duration(2.0), "2s");
        assert_eq!(human_duration(61.25), "1m 1s 250ms");
    }

    #[cfg(unix)]
    #[test]
    fn scratch_dir_is_removed_when_launch_fails() {
        let src = tempfile::tempdir().unwrap();
        let a = test_in(src.path(), r#"{"name": "a", "args": []}"#);
        let b = test_in(src.path(), r#"{"name": "b", "args": []}"#);

        let mut runner = FakeRunner::ok();
        runner.spawn_fails = true;
        let uc = usecase(runner);
        let root = tempfile::tempdir().unwrap();
        let outcome = uc
            .execute(request(vec![a, b], root.path().join("bench")))
            .unwrap();

        assert!(outcome.failed);
        assert_eq!(outcome.manifest.tests.len(), 2);
        for t in &outcome.manifest.tests {
            assert!(!t.passed);
            let msg = t.error_msg.as_deref().unwrap_or_default();
            assert!(msg.starts_with("failed to spawn"), "{msg}");
        }

        let seen = uc.runner.seen.borrow();
        assert_eq!(seen.len(), 2);
        for spec in seen.iter() {
            assert!(!spec.cwd.exists(), "scratch dir left behind: {}", spec.cwd.display());
        }
    }

    #[cfg(unix)]
    #[test]
    fn execution_failures_are_isolated_per_test() {
        let src = tempfile::tempdir().unwrap();
        let a = test_in(src.path(), r#"{"name": "a", "args": []}"#);
        let b = test_in(
            src.path(),
            r#"{"name": "b", "args": [], "output_files": {"never.dat": "exact"}}"#,
        );

        let mut runner = FakeRunner::ok();
        runner.exit_code = -11;
        let root = tempfile::tempdir().unwrap();
        let outcome = usecase(runner)
            .execute(request(vec![b, a], root.path().join("bench")))
            .unwrap();

        assert!(outcome.failed);
        let names: Vec<_> = outcome.manifest.tests.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        for t in &outcome.manifest.tests {
            assert_eq!(t.error_msg.as_deref(), Some("Segmentation fault"));
        }
    }

    #[cfg(unix)]
    #[test]
    fn timeout_and_fail_strings_and_missing_outputs() {
        let src = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();

        let mut runner = FakeRunner::ok();
        runner.duration_s = None;
        let t = test_in(src.path(), r#"{"name": "slow", "args": [], "timeout": 1}"#);
        let o = usecase(runner)
            .execute(request(vec![t], root.path().join("b1")))
            .unwrap();
        assert_eq!(o.manifest.tests[0].error_msg.as_deref(), Some("Program timed out"));
        assert_eq!(o.manifest.tests[0].duration_s, None);

        let mut runner = FakeRunner::ok();
        runner.stdout = "iteration 3: NaN detected\n".into();
        let t = test_in(src.path(), r#"{"name": "nan", "args": [], "fail_strings": ["NaN"]}"#);
        let o = usecase(runner)
            .execute(request(vec![t], root.path().join("b2")))
            .unwrap();
        assert_eq!(
            o.manifest.tests[0].error_msg.as_deref(),
            Some("Failure string found in log: \"NaN\"")
        );

        let t = test_in(
            src.path(),
            r#"{"name": "lazy", "args": [], "output_files": {"x.dat": "array"}}"#,
        );
        let o = usecase(FakeRunner::ok())
            .execute(request(vec![t], root.path().join("b3")))
            .unwrap();
        assert_eq!(
            o.manifest.tests[0].error_msg.as_deref(),
            Some("Output file not generated: \"x.dat\"")
        );
    }

    #[cfg(unix)]
    #[test]
    fn version_gate_drops_tests_before_validation() {
        let src = tempfile::tempdir().unwrap();
        let newer = test_in(
            src.path(),
            r#"{"name": "new", "args": [], "minimum_app_version": "2.0",
                "input_files": ["absent.dat"]}"#,
        );
        let ok = test_in(src.path(), r#"{"name": "old", "args": []}"#);

        let root = tempfile::tempdir().unwrap();
        let o = usecase(FakeRunner::ok())
            .execute(request(vec![newer, ok], root.path().join("bench")))
            .unwrap();
        assert_eq!(o.skipped, vec!["new".to_string()]);
        assert_eq!(o.manifest.tests.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn suite_validation_aborts_before_any_run() {
        let src = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();

        let t = test_in(
            src.path(),
            r#"{"name": "t", "args": [], "output_files": {"a": "fuzzy"}}"#,
        );
        let uc = usecase(FakeRunner::ok());
        let err = uc
            .execute(request(vec![t], root.path().join("b1")))
            .unwrap_err();
        assert!(err.to_string().contains("fuzzy"));
        assert!(uc.runner.seen.borrow().is_empty());
        assert!(!root.path().join("b1").exists());

        let t = test_in(src.path(), r#"{"name": "t", "args": [], "input_files": ["nope"]}"#);
        assert!(uc.execute(request(vec![t], root.path().join("b2"))).is_err());

        let t = test_in(src.path(), r#"{"name": "t", "args": []}"#);
        let mut req = request(vec![t], root.path().join("b3"));
        req.app.exe = "no-such-solver-9c1e".into();
        let err = uc.execute(req).unwrap_err();
        assert!(err.to_string().contains("Unable to find executable"));

        let t = test_in(src.path(), r#"{"name": "t", "args": []}"#);
        let err = uc
            .execute(request(vec![t], root.path().to_path_buf()))
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[cfg(unix)]
    #[test]
    fn cancellation_stops_before_next_test_and_keeps_manifest() {
        let src = tempfile::tempdir().unwrap();
        let t = test_in(src.path(), r#"{"name": "t", "args": []}"#);
        let root = tempfile::tempdir().unwrap();
        let req = request(vec![t], root.path().join("bench"));
        req.cancel.store(true, Ordering::SeqCst);

        let o = usecase(FakeRunner::ok()).execute(req).unwrap();
        assert!(o.cancelled);
        assert!(o.manifest.tests.is_empty());
        assert!(o.manifest_path.is_file());
    }

    #[cfg(unix)]
    #[test]
    fn real_processes_run_end_to_end() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("in.txt"), "42\n").unwrap();
        let t = test_in(
            src.path(),
            r#"{"name": "copy", "args": ["-c", "cp in.txt out.txt"],
                "input_files": ["in.txt"], "output_files": {"out.txt": "exact"}}"#,
        );

        let uc = ExecuteSuiteUseCase::new(
            nrtest_adapters::StdProcessRunner::default(),
            nrtest_adapters::ShellEnvResolver::default(),
            StdHostProbe,
            SystemClock,
            Registry::with_builtins(),
        );
        let root = tempfile::tempdir().unwrap();
        let mut req = request(vec![t], root.path().join("bench"));
        req.app.exe = "sh".into();

        let o = uc.execute(req).unwrap();
        assert!(!o.failed, "{:?}", o.manifest.tests[0].error_msg);
        assert_eq!(
            fs::read_to_string(root.path().join("bench/copy/out.txt")).unwrap(),
            "42\n"
        );
    }

    #[test]
    fn projection_keeps_what_compare_needs() {
        let spec: TestSpec =
            serde_json::from_str(r#"{"name": "t", "args": ["x"], "version": "1.0"}"#).unwrap();
        let r = project(&spec, Some("Program timed out".into()), None);
        assert!(!r.passed);
        assert_eq!(r.version, Some(Version::new(1, 0, 0)));
        assert_eq!(r.duration_s, None);
        assert_eq!(r.peak_memory_mb, None);
    }
}
