//! Environment resolution through a sourced setup script.

use crate::AdapterError;
use crate::process::checked_output;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

pub type Environment = BTreeMap<String, String>;

pub trait EnvResolver {
    /// The environment after sourcing `script`, or our own when there is none.
    fn resolve(&self, script: Option<&Path>) -> Result<Environment, AdapterError>;
}

/// Sources the script in bash and captures `env -0`.
#[derive(Debug, Clone)]
pub struct ShellEnvResolver {
    shell: PathBuf,
}

impl Default for ShellEnvResolver {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("bash"),
        }
    }
}

impl EnvResolver for ShellEnvResolver {
    fn resolve(&self, script: Option<&Path>) -> Result<Environment, AdapterError> {
        let Some(script) = script else {
            return Ok(ambient());
        };
        if !script.is_file() {
            return Err(AdapterError::SetupScriptNotFound(script.to_path_buf()));
        }

        let mut cmd = Command::new(&self.shell);
        // The script's own output must not pollute the captured environment.
        cmd.arg("-c")
            .arg(r#"source "$1" >/dev/null && env -0"#)
            .arg("nrtest-env")
            .arg(script);
        let out = checked_output(&mut cmd, "setup script shell")?;

        if !out.status.success() {
            return Err(AdapterError::SetupScriptFailed {
                script: script.to_path_buf(),
                status: out.status.to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }

        let env = parse_env_block(&out.stdout);
        tracing::debug!(script = %script.display(), vars = env.len(), "environment resolved");
        Ok(env)
    }
}

/// Our own environment; undecodable entries are converted lossily.
pub fn ambient() -> Environment {
    std::env::vars_os()
        .map(|(k, v)| {
            (
                k.to_string_lossy().into_owned(),
                v.to_string_lossy().into_owned(),
            )
        })
        .collect()
}

/// Parse NUL-separated `KEY=VALUE` records.
fn parse_env_block(bytes: &[u8]) -> Environment {
    bytes
        .split(|b| *b == 0)
        .filter(|rec| !rec.is_empty())
        .filter_map(|rec| {
            let rec = String::from_utf8_lossy(rec);
            rec.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
        })
        .collect()
}
