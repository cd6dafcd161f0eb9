//! Launching and supervising the program under test.

use crate::AdapterError;
use crate::sampling::{ProcessSampler, SampleSeries, SamplingPolicy, SysinfoSampler};
use anyhow::Context;
use nrtest_types::ExecutionResult;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_STEP: Duration = Duration::from_millis(10);

/// Everything needed to run one test command.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    pub cwd: PathBuf,

    /// Complete environment of the child. `None` inherits ours.
    pub env: Option<BTreeMap<String, String>>,

    pub stdout: PathBuf,
    pub stderr: PathBuf,
    pub timeout: Option<Duration>,
}

pub trait ProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<ExecutionResult, AdapterError>;
}

#[derive(Debug, Default, Clone)]
pub struct StdProcessRunner {
    pub policy: SamplingPolicy,
}

impl ProcessRunner for StdProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<ExecutionResult, AdapterError> {
        if spec.argv.is_empty() {
            return Err(AdapterError::EmptyArgv);
        }

        let stdout = create_sink(&spec.stdout)?;
        let stderr = create_sink(&spec.stderr)?;

        let running = launch(&spec.argv, &spec.cwd, spec.env.as_ref(), stdout, stderr)?;
        let mut sampler = SysinfoSampler::new();
        supervise(running, spec.timeout, &mut sampler, self.policy)
    }
}

fn create_sink(path: &Path) -> Result<File, AdapterError> {
    File::create(path).map_err(|source| AdapterError::Sink {
        path: path.to_path_buf(),
        source,
    })
}

/// A spawned child and the instant it was started.
#[derive(Debug)]
pub struct Running {
    child: Child,
    started: Instant,
}

impl Running {
    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

/// Spawn `argv` in `cwd` with stdout/stderr redirected to the given files.
pub fn launch(
    argv: &[String],
    cwd: &Path,
    env: Option<&BTreeMap<String, String>>,
    stdout: File,
    stderr: File,
) -> Result<Running, AdapterError> {
    let (program, args) = argv.split_first().ok_or(AdapterError::EmptyArgv)?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));

    if let Some(env) = env {
        cmd.env_clear().envs(env);
    }

    let started = Instant::now();
    let child = cmd.spawn().map_err(|source| AdapterError::Spawn {
        argv: argv.to_vec(),
        source,
    })?;

    debug!(pid = child.id(), ?argv, "launched");
    Ok(Running { child, started })
}

/// Poll `running` until it exits or `timeout` elapses, sampling telemetry
/// between polls.
///
/// A killed process reports exit code 0 and no duration.
pub fn supervise(
    mut running: Running,
    timeout: Option<Duration>,
    sampler: &mut dyn ProcessSampler,
    policy: SamplingPolicy,
) -> Result<ExecutionResult, AdapterError> {
    let pid = running.pid();
    let mut series = SampleSeries::new(policy);

    loop {
        let mut window = series.interval();
        if let Some(t) = timeout {
            window = window.min(t.saturating_sub(running.started.elapsed()));
        }

        if let Some(exit) = wait_up_to(&mut running.child, window)? {
            let duration = running.started.elapsed();
            if let Some(kb) = exit.max_rss_kb {
                series.observe_peak(kb as f64 / 1024.0);
            }
            let (samples, peak_memory_mb) = series.into_parts();
            return Ok(ExecutionResult {
                exit_code: exit.code,
                duration_s: Some(duration.as_secs_f64()),
                samples,
                peak_memory_mb,
            });
        }

        let elapsed = running.started.elapsed();
        match sampler.sample(pid) {
            Ok(raw) => series.push(elapsed.as_secs_f64(), &raw),
            Err(e) => debug!(pid, error = %e, "sample skipped"),
        }

        if timeout.is_some_and(|t| elapsed >= t) {
            warn!(
                pid,
                elapsed_s = elapsed.as_secs_f64(),
                peak_mb = series.peak_memory_mb(),
                "timeout reached, killing"
            );
            kill(&mut running.child)?;
            let (samples, peak_memory_mb) = series.into_parts();
            return Ok(ExecutionResult {
                exit_code: 0,
                duration_s: None,
                samples,
                peak_memory_mb,
            });
        }
    }
}

struct Exit {
    code: i32,
    max_rss_kb: Option<u64>,
}

#[cfg(unix)]
fn wait_up_to(child: &mut Child, window: Duration) -> Result<Option<Exit>, AdapterError> {
    use std::os::unix::process::ExitStatusExt;

    let pid = child.id() as libc::pid_t;
    let start = Instant::now();
    let mut status: libc::c_int = 0;
    let mut ru: libc::rusage = unsafe { std::mem::zeroed() };

    loop {
        let res = unsafe { libc::wait4(pid, &mut status as *mut libc::c_int, libc::WNOHANG, &mut ru) };

        if res == pid {
            let exit = std::process::ExitStatus::from_raw(status);
            // Signals are reported negated, so SIGSEGV is -11.
            let code = exit
                .code()
                .or_else(|| exit.signal().map(|s| -s))
                .unwrap_or(-1);
            return Ok(Some(Exit {
                code,
                max_rss_kb: Some(ru_maxrss_kb(&ru)),
            }));
        }

        if res == 0 {
            let spent = start.elapsed();
            if spent >= window {
                return Ok(None);
            }
            std::thread::sleep(POLL_STEP.min(window - spent));
            continue;
        }

        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::Interrupted {
            continue;
        }
        return Err(AdapterError::Other(anyhow::anyhow!("wait4 failed: {err}")));
    }
}

#[cfg(not(unix))]
fn wait_up_to(child: &mut Child, window: Duration) -> Result<Option<Exit>, AdapterError> {
    let start = Instant::now();
    loop {
        let status = child.try_wait().context("failed to poll child")?;
        if let Some(status) = status {
            return Ok(Some(Exit {
                code: status.code().unwrap_or(-1),
                max_rss_kb: None,
            }));
        }
        let spent = start.elapsed();
        if spent >= window {
            return Ok(None);
        }
        std::thread::sleep(POLL_STEP.min(window - spent));
    }
}

#[cfg(unix)]
fn kill(child: &mut Child) -> Result<(), AdapterError> {
    let pid = child.id() as libc::pid_t;
    let mut status: libc::c_int = 0;
    let mut ru: libc::rusage = unsafe { std::mem::zeroed() };

    unsafe {
        libc::kill(pid, libc::SIGKILL);
    }
    loop {
        let res = unsafe { libc::wait4(pid, &mut status as *mut libc::c_int, 0, &mut ru) };
        if res == pid {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(AdapterError::Other(anyhow::anyhow!(
                "wait4 after kill failed: {err}"
            )));
        }
    }
}

#[cfg(not(unix))]
fn kill(child: &mut Child) -> Result<(), AdapterError> {
    child.kill().context("failed to kill child")?;
    child.wait().context("failed to reap killed child")?;
    Ok(())
}

#[cfg(unix)]
fn ru_maxrss_kb(ru: &libc::rusage) -> u64 {
    let raw = ru.ru_maxrss as u64;

    // Linux reports KB, macOS bytes.
    #[cfg(target_os = "macos")]
    {
        raw / 1024
    }

    #[cfg(not(target_os = "macos"))]
    {
        raw
    }
}

/// Run a finished command line and fail with context unless it succeeds.
/// Used for helper processes, not for programs under test.
pub(crate) fn checked_output(cmd: &mut Command, what: &str) -> anyhow::Result<std::process::Output> {
    cmd.stdin(Stdio::null())
        .output()
        .with_context(|| format!("failed to run {what}"))
}
