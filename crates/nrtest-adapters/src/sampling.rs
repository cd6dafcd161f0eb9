//! Performance telemetry of a running child.

use nrtest_types::PerformanceSample;
use std::time::Duration;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One raw reading of a process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub cpu_pct: f64,
    pub memory_bytes: u64,
    /// Cumulative bytes read, where the platform reports it.
    pub read_bytes: Option<u64>,
    /// Cumulative bytes written, where the platform reports it.
    pub written_bytes: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("process {0} is no longer visible")]
    Gone(u32),
}

pub trait ProcessSampler {
    fn sample(&mut self, pid: u32) -> Result<RawSample, SampleError>;
}

/// Polling cadence and memory budget of a supervised run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPolicy {
    pub min_interval: Duration,
    pub max_samples: usize,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(1),
            max_samples: 10,
        }
    }
}

/// Bounded series of samples with exponential back-off.
///
/// Once `max_samples` is reached every other sample is dropped and the
/// polling interval doubles. Peak memory is tracked over every pushed
/// sample, not just the retained ones.
#[derive(Debug, Clone)]
pub struct SampleSeries {
    max_samples: usize,
    interval: Duration,
    samples: Vec<PerformanceSample>,
    peak_memory_mb: f64,
}

impl SampleSeries {
    pub fn new(policy: SamplingPolicy) -> Self {
        Self {
            max_samples: policy.max_samples.max(2),
            interval: policy.min_interval,
            samples: Vec::with_capacity(policy.max_samples),
            peak_memory_mb: 0.0,
        }
    }

    /// Current polling interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn peak_memory_mb(&self) -> f64 {
        self.peak_memory_mb
    }

    /// Record a sample taken `time_s` seconds after process start.
    pub fn push(&mut self, time_s: f64, raw: &RawSample) {
        let sample = PerformanceSample {
            time_s,
            cpu_pct: raw.cpu_pct,
            memory_mb: raw.memory_bytes as f64 / BYTES_PER_MB,
            read_mb: raw.read_bytes.map(|b| b as f64 / BYTES_PER_MB),
            write_mb: raw.written_bytes.map(|b| b as f64 / BYTES_PER_MB),
        };
        self.observe_peak(sample.memory_mb);
        self.samples.push(sample);

        if self.samples.len() >= self.max_samples {
            self.decimate();
        }
    }

    /// Raise the peak from a reading that is not part of the series.
    pub fn observe_peak(&mut self, memory_mb: f64) {
        if memory_mb > self.peak_memory_mb {
            self.peak_memory_mb = memory_mb;
        }
    }

    /// Keep odd positions, drop even ones, double the interval.
    fn decimate(&mut self) {
        let mut idx = 0;
        self.samples.retain(|_| {
            let keep = idx % 2 == 1;
            idx += 1;
            keep
        });
        self.interval = self.interval.saturating_mul(2);
    }

    pub fn into_parts(self) -> (Vec<PerformanceSample>, f64) {
        (self.samples, self.peak_memory_mb)
    }
}

/// Samples CPU, resident memory and disk I/O through `sysinfo`.
pub struct SysinfoSampler {
    system: sysinfo::System,
}

impl std::fmt::Debug for SysinfoSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoSampler").finish_non_exhaustive()
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoSampler {
    pub fn new() -> Self {
        Self {
            system: sysinfo::System::new(),
        }
    }
}

impl ProcessSampler for SysinfoSampler {
    fn sample(&mut self, pid: u32) -> Result<RawSample, SampleError> {
        use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate};

        let spid = Pid::from_u32(pid);
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[spid]),
            true,
            ProcessRefreshKind::nothing()
                .with_cpu()
                .with_memory()
                .with_disk_usage(),
        );
        let process = self.system.process(spid).ok_or(SampleError::Gone(pid))?;

        // Disk counters are only meaningful on these platforms.
        let io = cfg!(any(target_os = "linux", target_os = "windows"));
        let disk = process.disk_usage();

        Ok(RawSample {
            cpu_pct: f64::from(process.cpu_usage()),
            memory_bytes: process.memory(),
            read_bytes: io.then_some(disk.total_read_bytes),
            written_bytes: io.then_some(disk.total_written_bytes),
        })
    }
}
