use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use schemars::{Schema, schema_for};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command as Process;

#[derive(Debug, Parser)]
#[command(name = "xtask", about = "Repo automation for nrtest")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// (Re)generate JSON Schemas for manifests, compare reports and configs.
    Schema {
        #[arg(long, default_value = "schemas")]
        out_dir: PathBuf,

        /// Fail if the files on disk differ from what would be generated
        #[arg(long, default_value_t = false)]
        check: bool,
    },

    /// fmt, clippy, tests, then a schema drift check.
    Ci,

    /// Mutation testing via cargo-mutants (must be installed).
    Mutants {
        /// Restrict to one workspace package, e.g. nrtest-domain
        #[arg(long)]
        package: Option<String>,

        /// Extra args forwarded to cargo-mutants
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    match Cli::parse().cmd {
        Command::Schema { out_dir, check } => cmd_schema(&out_dir, check),
        Command::Ci => cmd_ci(),
        Command::Mutants { package, args } => cmd_mutants(package, args),
    }
}

fn schemas() -> Vec<(&'static str, Schema)> {
    vec![
        (
            "nrtest.manifest.v1.schema.json",
            schema_for!(nrtest_types::Manifest),
        ),
        (
            "nrtest.compare.v1.schema.json",
            schema_for!(nrtest_types::CompareReport),
        ),
        (
            "nrtest.application.schema.json",
            schema_for!(nrtest_types::Application),
        ),
        ("nrtest.test.schema.json", schema_for!(nrtest_types::TestSpec)),
    ]
}

fn cmd_schema(out_dir: &Path, check: bool) -> anyhow::Result<()> {
    if !check {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("create dir {}", out_dir.display()))?;
    }

    let mut stale = Vec::new();
    for (name, schema) in schemas() {
        let path = out_dir.join(name);
        let mut json = serde_json::to_string_pretty(&schema)?;
        json.push('\n');

        if check {
            let current = fs::read_to_string(&path).unwrap_or_default();
            if current != json {
                stale.push(name);
            }
        } else {
            fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
        }
    }

    if !stale.is_empty() {
        bail!(
            "schemas out of date: {} (run `cargo run -p xtask -- schema`)",
            stale.join(", ")
        );
    }
    Ok(())
}

fn cmd_ci() -> anyhow::Result<()> {
    cargo(&["fmt", "--all", "--", "--check"])?;
    cargo(&[
        "clippy",
        "--workspace",
        "--all-targets",
        "--",
        "-D",
        "warnings",
    ])?;
    cargo(&["test", "--workspace"])?;
    cmd_schema(Path::new("schemas"), true)
}

fn cmd_mutants(package: Option<String>, args: Vec<String>) -> anyhow::Result<()> {
    let mut argv = vec!["mutants".to_string()];
    if let Some(p) = package {
        argv.push("--package".into());
        argv.push(p);
    }
    argv.extend(args);
    let argv: Vec<&str> = argv.iter().map(String::as_str).collect();
    cargo(&argv)
}

fn cargo(args: &[&str]) -> anyhow::Result<()> {
    let status = Process::new("cargo")
        .args(args)
        .status()
        .with_context(|| format!("running cargo {}", args.join(" ")))?;
    if !status.success() {
        bail!("cargo {} failed: {status}", args.join(" "));
    }
    Ok(())
}
