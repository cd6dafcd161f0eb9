use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use nrtest_adapters::{ShellEnvResolver, StdHostProbe, StdProcessRunner, read_json, write_json};
use nrtest_app::{
    CompareRequest, CompareSuiteUseCase, ExecuteRequest, ExecuteSuiteUseCase, SystemClock,
    expand_test_configs, github_annotations, load_application, load_test, render_markdown,
};
use nrtest_diff::Registry;
use nrtest_types::{CompareReport, ToolInfo};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_FAIL: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Parser)]
#[command(
    name = "nrtest",
    version,
    about = "Numerical regression testing: run a suite, compare it against a benchmark"
)]
struct Cli {
    /// More logging (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a test suite and record its outputs as a benchmark directory.
    Execute {
        /// Application configuration (JSON, or TOML by extension)
        app_config: PathBuf,

        /// Test configurations or glob patterns
        #[arg(required = true)]
        tests: Vec<String>,

        /// Benchmark directory to create (must not exist)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Compare a SUT benchmark directory against a reference one.
    Compare {
        sut: PathBuf,

        benchmark: PathBuf,

        /// Relative tolerance (0.01 = 1%)
        #[arg(long, default_value_t = 0.01)]
        tolerance: f64,

        /// Also compare recorded wall-clock durations
        #[arg(long, default_value_t = false)]
        performance: bool,

        /// Write the compare report (JSON) here
        #[arg(long)]
        out: Option<PathBuf>,

        /// Pretty-print JSON
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },

    /// Render a Markdown summary from a compare report.
    Md {
        #[arg(long)]
        compare: PathBuf,

        /// Output markdown path (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Emit GitHub Actions annotations from a compare report.
    GithubAnnotations {
        #[arg(long)]
        compare: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match real_main(cli.cmd) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn real_main(cmd: Command) -> anyhow::Result<ExitCode> {
    match cmd {
        Command::Execute {
            app_config,
            tests,
            output,
        } => {
            let app = load_application(&app_config)?;
            let tests = expand_test_configs(&tests)?
                .iter()
                .map(|p| load_test(p))
                .collect::<Result<Vec<_>, _>>()?;

            let cancel = Arc::new(AtomicBool::new(false));
            {
                let cancel = Arc::clone(&cancel);
                ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst))
                    .context("install Ctrl-C handler")?;
            }

            let usecase = ExecuteSuiteUseCase::new(
                StdProcessRunner::default(),
                ShellEnvResolver::default(),
                StdHostProbe,
                SystemClock,
                Registry::with_builtins(),
            );
            let outcome = usecase.execute(ExecuteRequest {
                app,
                tests,
                benchmark_dir: output,
                tool: tool_info(),
                cancel,
            })?;

            tracing::info!(manifest = %outcome.manifest_path.display(), "suite recorded");

            if outcome.cancelled {
                Ok(ExitCode::from(EXIT_INTERRUPTED))
            } else if outcome.failed {
                Ok(ExitCode::from(EXIT_FAIL))
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }

        Command::Compare {
            sut,
            benchmark,
            tolerance,
            performance,
            out,
            pretty,
        } => {
            let usecase = CompareSuiteUseCase::new(Registry::with_builtins());
            let report = usecase.execute(CompareRequest {
                sut_dir: sut,
                benchmark_dir: benchmark,
                tolerance,
                performance,
                tool: tool_info(),
            })?;

            if let Some(path) = out {
                write_json(&path, &report, pretty)?;
            }

            if report.passed {
                println!("compatible");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("incompatible");
                Ok(ExitCode::from(EXIT_FAIL))
            }
        }

        Command::Md { compare, out } => {
            let report: CompareReport = read_json(&compare)?;
            let md = render_markdown(&report);

            match out {
                Some(path) => {
                    fs::write(&path, md).with_context(|| format!("write {}", path.display()))?;
                }
                None => {
                    print!("{md}");
                }
            }

            Ok(ExitCode::SUCCESS)
        }

        Command::GithubAnnotations { compare } => {
            let report: CompareReport = read_json(&compare)?;
            for line in github_annotations(&report) {
                println!("{line}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn tool_info() -> ToolInfo {
    ToolInfo {
        name: "nrtest".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}
