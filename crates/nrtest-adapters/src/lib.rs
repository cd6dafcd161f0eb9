//! Std adapters for nrtest.
//!
//! In clean-arch terms: this is where we touch the world.

mod env;
mod fs;
mod host;
mod process;
mod sampling;
mod workspace;

pub use env::{EnvResolver, Environment, ShellEnvResolver, ambient};
pub use fs::{atomic_write, read_json, write_json};
pub use host::{HostProbe, StdHostProbe, find_executable};
pub use process::{CommandSpec, ProcessRunner, Running, StdProcessRunner, launch, supervise};
pub use sampling::{
    ProcessSampler, RawSample, SampleError, SampleSeries, SamplingPolicy, SysinfoSampler,
};
pub use workspace::{Scratch, copy_file_and_path, copy_produced, find_fail_string};

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("command argv must not be empty")]
    EmptyArgv,

    #[error("Unable to find setup script: \"{}\"", .0.display())]
    SetupScriptNotFound(PathBuf),

    #[error("setup script \"{}\" failed ({status}): {stderr}", script.display())]
    SetupScriptFailed {
        script: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("Unable to write log file \"{}\": {source}", path.display())]
    Sink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn {argv:?}: {source}")]
    Spawn {
        argv: Vec<String>,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
