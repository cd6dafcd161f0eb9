#![allow(dead_code)]

use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

/// Lay out an application plus one test per `(name, script)` pair. Each test
/// runs `sh -c <script>` and declares `out.dat` as an `array` output.
pub fn write_suite(dir: &Path, version: &str, tests: &[(&str, &str)]) -> (PathBuf, Vec<PathBuf>) {
    fs::create_dir_all(dir).expect("create suite dir");
    let app = dir.join("app.json");
    fs::write(
        &app,
        json!({"name": "solver", "exe": "sh", "version": version}).to_string(),
    )
    .expect("write app config");

    let mut configs = Vec::new();
    for (name, script) in tests {
        let path = dir.join(format!("{name}.json"));
        fs::write(
            &path,
            json!({
                "name": name,
                "args": ["-c", script],
                "output_files": {"out.dat": "array"},
            })
            .to_string(),
        )
        .expect("write test config");
        configs.push(path);
    }
    (app, configs)
}

pub fn nrtest() -> assert_cmd::Command {
    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("nrtest"))
}

pub fn execute(app: &Path, tests: &[PathBuf], output: &Path) -> assert_cmd::assert::Assert {
    let mut cmd = nrtest();
    cmd.arg("execute").arg(app).args(tests).arg("--output").arg(output);
    cmd.assert()
}

pub fn read_json(path: &Path) -> serde_json::Value {
    let text = fs::read_to_string(path).expect("read json");
    serde_json::from_str(&text).expect("valid json")
}
