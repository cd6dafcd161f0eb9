//! Comparing a SUT run against a benchmark run.

use crate::config::slugify;
use anyhow::bail;
use nrtest_adapters::read_json;
use nrtest_diff::{DurationDiff, NumericComparator, Registry};
use nrtest_domain::{format_pct, judge_files, suite_verdict};
use nrtest_types::{
    COMPARE_SCHEMA_V1, CompareReport, FileOutcome, FileVerdict, MANIFEST_FNAME,
    MANIFEST_SCHEMA_V1, Manifest, ManifestRef, TestRecord, TestVerdict, ToolInfo,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Pseudo file name under which the duration check is reported.
pub const DURATION_ENTRY: &str = "<duration>";

#[derive(Debug, Clone)]
pub struct CompareRequest {
    pub sut_dir: PathBuf,
    pub benchmark_dir: PathBuf,

    /// Maximum accepted relative deviation (0.01 = 1%).
    pub tolerance: f64,

    /// Also grade wall-clock slowdowns.
    pub performance: bool,

    pub tool: ToolInfo,
}

/// One side of a comparison: a manifest and the directory it came from.
#[derive(Debug, Clone, Copy)]
pub struct Suite<'a> {
    pub manifest: &'a Manifest,
    pub root: &'a Path,
}

impl Suite<'_> {
    fn file(&self, test: &str, file: &str) -> PathBuf {
        self.root.join(slugify(test)).join(file)
    }
}

/// How strictly a pair of tests is judged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompareOptions {
    pub tolerance: f64,
    pub performance: bool,
}

pub struct CompareSuiteUseCase {
    registry: Registry,
}

impl CompareSuiteUseCase {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn execute(&self, req: CompareRequest) -> anyhow::Result<CompareReport> {
        if !(req.tolerance.is_finite() && req.tolerance >= 0.0) {
            bail!("tolerance must be a finite non-negative number, got {}", req.tolerance);
        }

        let sut = load_manifest(&req.sut_dir)?;
        let bench = load_manifest(&req.benchmark_dir)?;

        let (tests, warnings) = self.compare_suites(
            Suite {
                manifest: &sut,
                root: &req.sut_dir,
            },
            Suite {
                manifest: &bench,
                root: &req.benchmark_dir,
            },
            CompareOptions {
                tolerance: req.tolerance,
                performance: req.performance,
            },
        )?;
        let (passed, counts) = suite_verdict(&tests);

        Ok(CompareReport {
            schema: COMPARE_SCHEMA_V1.to_string(),
            tool: req.tool,
            tolerance: req.tolerance,
            sut: manifest_ref(&req.sut_dir, &sut),
            benchmark: manifest_ref(&req.benchmark_dir, &bench),
            passed,
            counts,
            tests,
            warnings,
        })
    }

    /// Per-test verdicts, sorted by name, plus warnings.
    ///
    /// Fails outright when the SUT has tests the benchmark lacks or when a
    /// declared tag has no comparator.
    pub fn compare_suites(
        &self,
        sut: Suite<'_>,
        bench: Suite<'_>,
        opts: CompareOptions,
    ) -> anyhow::Result<(Vec<TestVerdict>, Vec<String>)> {
        let sut_tests: BTreeMap<&str, &TestRecord> = sut
            .manifest
            .tests
            .iter()
            .map(|t| (t.name.as_str(), t))
            .collect();
        let ref_tests: BTreeMap<&str, &TestRecord> = bench
            .manifest
            .tests
            .iter()
            .map(|t| (t.name.as_str(), t))
            .collect();

        let missing: Vec<&str> = sut_tests
            .keys()
            .filter(|n| !ref_tests.contains_key(*n))
            .copied()
            .collect();
        if !missing.is_empty() {
            bail!(
                "SUT and benchmark contain different tests; not in benchmark: {}",
                missing.join(", ")
            );
        }

        let mut warnings = Vec::new();
        for name in ref_tests.keys().filter(|n| !sut_tests.contains_key(*n)) {
            let msg = format!("benchmark test {name:?} has no SUT result");
            warn!("{msg}");
            warnings.push(msg);
        }

        let unknown = self.registry.unresolved(
            sut_tests
                .values()
                .chain(ref_tests.values())
                .flat_map(|t| t.output_files.values().map(String::as_str)),
        );
        if !unknown.is_empty() {
            bail!("unknown comparator tag(s): {}", unknown.join(", "));
        }

        let verdicts = sut_tests
            .iter()
            .map(|(name, sut_t)| {
                let verdict =
                    self.compare_test(sut_t, sut, ref_tests[name], bench, opts);
                match &verdict.reason {
                    None => info!(test = %name, grade = %format_pct(verdict.grade), "pass"),
                    Some(r) => {
                        info!(test = %name, grade = %format_pct(verdict.grade), "fail");
                        debug!(test = %name, reason = %r);
                    }
                }
                verdict
            })
            .collect();

        Ok((verdicts, warnings))
    }

    fn compare_test(
        &self,
        sut_t: &TestRecord,
        sut: Suite<'_>,
        ref_t: &TestRecord,
        bench: Suite<'_>,
        opts: CompareOptions,
    ) -> TestVerdict {
        let fail = |reason: &str| TestVerdict {
            name: sut_t.name.clone(),
            passed: false,
            grade: 0.0,
            reason: Some(reason.to_string()),
            files: vec![],
        };

        if !sut_t.passed || !ref_t.passed {
            return fail("execution failed");
        }
        if sut_t.output_files != ref_t.output_files {
            return fail("Benchmark has different output files");
        }

        let mut files: Vec<FileVerdict> = sut_t
            .output_files
            .iter()
            .map(|(file, tag)| {
                let outcome = match self.registry.compare(
                    tag,
                    &sut.file(&sut_t.name, file),
                    &bench.file(&ref_t.name, file),
                ) {
                    Ok(cmp) => cmp.outcome(),
                    Err(e) => FileOutcome::Error {
                        reason: e.to_string(),
                    },
                };
                FileVerdict {
                    file: file.clone(),
                    tag: tag.clone(),
                    outcome,
                }
            })
            .collect();

        if opts.performance
            && let (Some(c), Some(r)) = (sut_t.duration_s, ref_t.duration_s)
        {
            let outcome = match DurationDiff::new(c, r) {
                Ok(d) => FileOutcome::Numeric {
                    deviation: d.deviation(),
                },
                Err(e) => FileOutcome::Error {
                    reason: e.to_string(),
                },
            };
            files.push(FileVerdict {
                file: DURATION_ENTRY.to_string(),
                tag: "duration".to_string(),
                outcome,
            });
        }

        let judgement = judge_files(&files, opts.tolerance);
        TestVerdict {
            name: sut_t.name.clone(),
            passed: judgement.passed,
            grade: judgement.grade,
            reason: judgement.reason,
            files,
        }
    }
}

pub fn load_manifest(dir: &Path) -> anyhow::Result<Manifest> {
    if !dir.is_dir() {
        bail!("Benchmark directory not found: \"{}\"", dir.display());
    }
    let path = dir.join(MANIFEST_FNAME);
    if !path.is_file() {
        bail!("Benchmark manifest not found: \"{}\"", path.display());
    }
    let manifest: Manifest = read_json(&path)?;
    if manifest.schema != MANIFEST_SCHEMA_V1 {
        bail!(
            "{}: unsupported manifest schema {:?}",
            path.display(),
            manifest.schema
        );
    }
    Ok(manifest)
}

fn manifest_ref(dir: &Path, m: &Manifest) -> ManifestRef {
    ManifestRef {
        path: dir.display().to_string(),
        app_name: m.application.name.clone(),
        app_version: m.application.version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nrtest_adapters::write_json;
    use nrtest_types::{AppRecord, HostInfo, Version};
    use std::fs;

    fn record(name: &str, outputs: &[(&str, &str)]) -> TestRecord {
        TestRecord {
            name: name.into(),
            version: None,
            description: None,
            output_files: outputs
                .iter()
                .map(|(f, t)| (f.to_string(), t.to_string()))
                .collect(),
            passed: true,
            error_msg: None,
            duration_s: Some(10.0),
            peak_memory_mb: Some(5.0),
        }
    }

    fn manifest(version: &str, tests: Vec<TestRecord>) -> Manifest {
        Manifest {
            schema: MANIFEST_SCHEMA_V1.into(),
            tool: ToolInfo {
                name: "nrtest".into(),
                version: "0.0.0".into(),
            },
            host: HostInfo {
                os: "linux".into(),
                arch: "x86_64".into(),
                cpu_count: None,
                hostname: None,
            },
            created_at: "2026-01-01T00:00:00Z".into(),
            application: AppRecord {
                name: "solver".into(),
                version: version.parse::<Version>().unwrap(),
                description: None,
            },
            tests,
        }
    }

    fn put(root: &Path, test: &str, file: &str, body: &str) {
        let p = root.join(slugify(test)).join(file);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, body).unwrap();
    }

    fn write_suite(root: &Path, m: &Manifest) {
        write_json(&root.join(MANIFEST_FNAME), m, true).unwrap();
    }

    fn request(sut: &Path, bench: &Path, tolerance: f64) -> CompareRequest {
        CompareRequest {
            sut_dir: sut.to_path_buf(),
            benchmark_dir: bench.to_path_buf(),
            tolerance,
            performance: false,
            tool: ToolInfo {
                name: "nrtest".into(),
                version: "0.0.0".into(),
            },
        }
    }

    /// Suite of three tests: A exact match, B 2% array drift, C timed out.
    fn scenario(sut: &Path, bench: &Path) {
        let tests = |c_passed: bool| {
            let mut c = record("C", &[("c.out", "exact")]);
            c.passed = c_passed;
            if !c_passed {
                c.error_msg = Some("Program timed out".into());
                c.duration_s = None;
            }
            vec![
                record("A", &[("a.out", "exact")]),
                record("B", &[("b.dat", "array")]),
                c,
            ]
        };
        write_suite(sut, &manifest("2.0", tests(false)));
        write_suite(bench, &manifest("1.0", tests(true)));

        for root in [sut, bench] {
            put(root, "A", "a.out", "identical bytes\n");
            put(root, "C", "c.out", "partial\n");
        }
        put(sut, "B", "b.dat", "1.02 2.0\n3.0 4.0\n");
        put(bench, "B", "b.dat", "1.0 2.0\n3.0 4.0\n");
    }

    #[test]
    fn exact_array_and_timeout_scenario() {
        let sut = tempfile::tempdir().unwrap();
        let bench = tempfile::tempdir().unwrap();
        scenario(sut.path(), bench.path());

        let report = CompareSuiteUseCase::new(Registry::with_builtins())
            .execute(request(sut.path(), bench.path(), 0.01))
            .unwrap();

        assert!(!report.passed);
        assert_eq!(report.counts.pass, 1);
        assert_eq!(report.counts.fail, 2);

        let a = &report.tests[0];
        assert_eq!(a.name, "A");
        assert!(a.passed);
        assert_eq!(format_pct(a.grade), "0.00%");

        let b = &report.tests[1];
        assert!(!b.passed);
        assert_eq!(format_pct(b.grade), "2.00%");
        assert_eq!(
            b.reason.as_deref(),
            Some("b.dat: deviation 2.00% exceeds tolerance 1.00%")
        );

        let c = &report.tests[2];
        assert!(!c.passed);
        assert_eq!(c.reason.as_deref(), Some("execution failed"));

        assert_eq!(report.sut.app_version, "2.0");
        assert_eq!(report.benchmark.app_version, "1.0");
    }

    #[test]
    fn looser_tolerance_accepts_drift() {
        let sut = tempfile::tempdir().unwrap();
        let bench = tempfile::tempdir().unwrap();
        scenario(sut.path(), bench.path());

        let report = CompareSuiteUseCase::new(Registry::with_builtins())
            .execute(request(sut.path(), bench.path(), 0.05))
            .unwrap();
        assert!(report.tests[1].passed);
    }

    #[test]
    fn verdicts_do_not_depend_on_manifest_order() {
        let sut = tempfile::tempdir().unwrap();
        let bench = tempfile::tempdir().unwrap();
        scenario(sut.path(), bench.path());
        let uc = CompareSuiteUseCase::new(Registry::with_builtins());
        let first = uc.execute(request(sut.path(), bench.path(), 0.01)).unwrap();

        let mut m = load_manifest(sut.path()).unwrap();
        m.tests.reverse();
        write_suite(sut.path(), &m);
        let second = uc.execute(request(sut.path(), bench.path(), 0.01)).unwrap();

        assert_eq!(first.passed, second.passed);
        assert_eq!(first.tests, second.tests);
    }

    #[test]
    fn sut_tests_missing_from_benchmark_abort() {
        let sut = tempfile::tempdir().unwrap();
        let bench = tempfile::tempdir().unwrap();
        write_suite(sut.path(), &manifest("1.0", vec![record("x", &[]), record("y", &[])]));
        write_suite(bench.path(), &manifest("1.0", vec![record("x", &[])]));

        let err = CompareSuiteUseCase::new(Registry::with_builtins())
            .execute(request(sut.path(), bench.path(), 0.0))
            .unwrap_err();
        assert!(err.to_string().contains("not in benchmark: y"));
    }

    #[test]
    fn extra_benchmark_tests_only_warn() {
        let sut = tempfile::tempdir().unwrap();
        let bench = tempfile::tempdir().unwrap();
        write_suite(sut.path(), &manifest("1.0", vec![record("x", &[])]));
        write_suite(bench.path(), &manifest("1.0", vec![record("x", &[]), record("y", &[])]));

        let report = CompareSuiteUseCase::new(Registry::with_builtins())
            .execute(request(sut.path(), bench.path(), 0.0))
            .unwrap();
        assert!(report.passed);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("\"y\""));
    }

    #[test]
    fn unknown_tags_abort_before_comparing() {
        let sut = tempfile::tempdir().unwrap();
        let bench = tempfile::tempdir().unwrap();
        let t = vec![record("x", &[("f", "hdf5")])];
        write_suite(sut.path(), &manifest("1.0", t.clone()));
        write_suite(bench.path(), &manifest("1.0", t));

        let err = CompareSuiteUseCase::new(Registry::with_builtins())
            .execute(request(sut.path(), bench.path(), 0.0))
            .unwrap_err();
        assert!(err.to_string().contains("hdf5"));
    }

    #[test]
    fn differing_tags_and_missing_files_fail_the_test_only() {
        let sut = tempfile::tempdir().unwrap();
        let bench = tempfile::tempdir().unwrap();
        write_suite(
            sut.path(),
            &manifest(
                "1.0",
                vec![record("x", &[("f", "array")]), record("y", &[("g", "exact")])],
            ),
        );
        write_suite(
            bench.path(),
            &manifest(
                "1.0",
                vec![record("x", &[("f", "exact")]), record("y", &[("g", "exact")])],
            ),
        );
        put(sut.path(), "y", "g", "present");

        let report = CompareSuiteUseCase::new(Registry::with_builtins())
            .execute(request(sut.path(), bench.path(), 0.0))
            .unwrap();
        assert_eq!(
            report.tests[0].reason.as_deref(),
            Some("Benchmark has different output files")
        );
        let y = &report.tests[1];
        assert!(!y.passed);
        assert!(matches!(y.files[0].outcome, FileOutcome::Error { .. }));
        assert!(y.reason.as_deref().unwrap().starts_with("g: Unable to locate"));
    }

    #[test]
    fn performance_flag_grades_slowdowns() {
        let sut = tempfile::tempdir().unwrap();
        let bench = tempfile::tempdir().unwrap();
        let mut slow = record("x", &[]);
        slow.duration_s = Some(12.5);
        write_suite(sut.path(), &manifest("1.0", vec![slow]));
        write_suite(bench.path(), &manifest("1.0", vec![record("x", &[])]));

        let uc = CompareSuiteUseCase::new(Registry::with_builtins());
        let plain = uc.execute(request(sut.path(), bench.path(), 0.1)).unwrap();
        assert!(plain.passed);

        let mut req = request(sut.path(), bench.path(), 0.1);
        req.performance = true;
        let graded = uc.execute(req).unwrap();
        assert!(!graded.passed);
        assert!((graded.tests[0].grade - 0.25).abs() < 1e-12);
        assert_eq!(graded.tests[0].files[0].file, DURATION_ENTRY);
    }

    #[test]
    fn invalid_tolerance_and_missing_manifest_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let uc = CompareSuiteUseCase::new(Registry::with_builtins());
        assert!(uc.execute(request(dir.path(), dir.path(), -1.0)).is_err());
        let err = uc
            .execute(request(dir.path(), dir.path(), 0.1))
            .unwrap_err();
        assert!(err.to_string().contains("manifest not found"));
    }

    #[test]
    fn zero_reference_grade_survives_the_report_file() {
        let sut = tempfile::tempdir().unwrap();
        let bench = tempfile::tempdir().unwrap();
        let tests = || vec![record("Z", &[("z.dat", "array")])];
        write_suite(sut.path(), &manifest("2.0", tests()));
        write_suite(bench.path(), &manifest("1.0", tests()));
        put(sut.path(), "Z", "z.dat", "1.0 1e-9\n");
        put(bench.path(), "Z", "z.dat", "1.0 0.0\n");

        let report = CompareSuiteUseCase::new(Registry::with_builtins())
            .execute(request(sut.path(), bench.path(), 0.01))
            .unwrap();
        assert!(report.tests[0].grade.is_infinite());
        assert!(!report.passed);

        let out = sut.path().join("report.json");
        write_json(&out, &report, true).unwrap();
        let back: CompareReport = nrtest_adapters::read_json(&out).unwrap();
        assert!(back.tests[0].grade.is_infinite());
        assert!(!back.tests[0].passed);
        assert_eq!(back.tests[0].reason, report.tests[0].reason);
    }
}
