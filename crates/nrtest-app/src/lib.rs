//! Application layer for nrtest.
//!
//! The app layer coordinates adapters and domain logic.
//! It does not parse CLI flags.

pub mod compare;
pub mod config;
pub mod execute;

pub use compare::{
    CompareOptions, CompareRequest, CompareSuiteUseCase, DURATION_ENTRY, Suite, load_manifest,
};
pub use config::{
    ConfigError, LoadedTest, expand_test_configs, load_application, load_test, slugify,
};
pub use execute::{
    ExecuteOutcome, ExecuteRequest, ExecuteSuiteUseCase, TestFailure, project, version_gate,
};

use nrtest_domain::format_pct;
use nrtest_types::{CompareReport, FileOutcome};

pub trait Clock: Send + Sync {
    fn now_rfc3339(&self) -> String;
}

#[derive(Debug, Default, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_rfc3339(&self) -> String {
        use time::format_description::well_known::Rfc3339;
        time::OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    }
}

// ----------------------------
// Rendering helpers
// ----------------------------

pub fn render_markdown(report: &CompareReport) -> String {
    let mut out = String::new();

    let header = if report.passed {
        "✅ nrtest: compatible"
    } else {
        "❌ nrtest: incompatible"
    };
    out.push_str(header);
    out.push_str("\n\n");

    out.push_str(&format!(
        "**SUT:** `{} {}` vs **benchmark:** `{} {}`, tolerance {}\n\n",
        report.sut.app_name,
        report.sut.app_version,
        report.benchmark.app_name,
        report.benchmark.app_version,
        format_pct(report.tolerance),
    ));

    out.push_str("| test | grade | status | reason |\n");
    out.push_str("|---|---:|---|---|\n");

    for t in &report.tests {
        let status = if t.passed { "✅" } else { "❌" };
        out.push_str(&format!(
            "| `{}` | {} | {} | {} |\n",
            t.name,
            format_pct(t.grade),
            status,
            t.reason.as_deref().unwrap_or("").replace('|', "\\|"),
        ));
    }

    out.push_str(&format!(
        "\n{} passed, {} failed\n",
        report.counts.pass, report.counts.fail
    ));

    if !report.warnings.is_empty() {
        out.push_str("\n**Notes:**\n");
        for w in &report.warnings {
            out.push_str(&format!("- {w}\n"));
        }
    }

    out
}

pub fn github_annotations(report: &CompareReport) -> Vec<String> {
    let mut lines = Vec::new();

    for t in report.tests.iter().filter(|t| !t.passed) {
        let errored = t
            .files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Error { .. }))
            .count();
        let mut msg = format!(
            "nrtest {name}: {reason} (grade {grade})",
            name = t.name,
            reason = t.reason.as_deref().unwrap_or("failed"),
            grade = format_pct(t.grade),
        );
        if errored > 0 {
            msg.push_str(&format!(", {errored} file(s) could not be compared"));
        }
        lines.push(format!("::error::{msg}"));
    }

    for w in &report.warnings {
        lines.push(format!("::warning::nrtest {w}"));
    }

    lines
}
