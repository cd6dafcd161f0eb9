use nrtest_types::HostInfo;
use std::path::{Path, PathBuf};

/// Facts about the machine a suite runs on.
pub trait HostProbe {
    fn probe(&self) -> HostInfo;
}

#[derive(Debug, Default, Clone)]
pub struct StdHostProbe;

impl HostProbe for StdHostProbe {
    fn probe(&self) -> HostInfo {
        HostInfo {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpu_count: u32::try_from(num_cpus::get()).ok(),
            hostname: hostname::get()
                .ok()
                .map(|h| h.to_string_lossy().into_owned()),
        }
    }
}

/// Locate `program` on `path_var` (a `PATH`-style list), or accept it as is
/// when it already names an executable file.
pub fn find_executable(program: &str, path_var: Option<&str>, cwd: &Path) -> Option<PathBuf> {
    which::which_in(program, path_var, cwd).ok()
}
