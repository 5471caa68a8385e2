use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use tempfile::tempdir;

fn flowbench(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("flowbench").unwrap();
    cmd.current_dir(dir).env_remove("FLOWBENCH_WEBDRIVER_URL");
    cmd
}

fn read_json(path: &std::path::Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn flows_lists_every_flow() {
    let dir = tempdir().unwrap();
    flowbench(dir.path())
        .arg("flows")
        .assert()
        .success()
        .stdout(predicate::str::contains("tab-switching\tPower User: Tab Switching"))
        .stdout(predicate::str::contains("import-srp"))
        .stdout(predicate::str::contains("nft-list-scrolling"));
}

#[test]
fn analyze_filters_and_aggregates_samples() {
    let dir = tempdir().unwrap();
    let samples: Vec<Value> = [10.0, 12.0, 11.0, 13.0, 1000.0, 3000.0]
        .iter()
        .enumerate()
        .map(|(i, inp)| {
            json!({
                "flow": "token-search",
                "run": i,
                "metrics": { "inp": inp, "navigation": [{ "load": 400 + i }] },
                "timestamp": 0
            })
        })
        .collect();
    fs::write(dir.path().join("samples.json"), json!(samples).to_string()).unwrap();

    let out = dir.path().join("reports/analysis.json");
    flowbench(dir.path())
        .args(["analyze", "samples.json", "--out"])
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("DATA QUALITY"));

    let doc = read_json(&out);
    let results = &doc["results"]["Power User: Token Search"];
    assert_eq!(results["mean"]["inp"], 11.5);
    assert_eq!(results["max"]["inp"], 13.0);
    assert_eq!(results["min"]["load"], 400.0);
    assert_eq!(doc["report"]["flowReports"][0]["iterationsCompleted"], 6);
    assert_eq!(doc["report"]["exitCode"], 0);
}

#[test]
fn replay_run_writes_report_and_skips_unknown_flows() {
    let dir = tempdir().unwrap();
    let recordings = json!({
        "tab-switching": [
            { "metrics": { "inp": 40 } },
            { "metrics": { "inp": 44 } }
        ]
    });
    fs::write(dir.path().join("rec.json"), recordings.to_string()).unwrap();

    flowbench(dir.path())
        .args([
            "run",
            "--replay",
            "rec.json",
            "--flows",
            "tab-switching",
            "bogus",
            "--browser-loads",
            "1",
            "--iterations",
            "2",
            "--out",
            "out/results.json",
        ])
        .assert()
        .code(0)
        .stderr(predicate::str::contains("Overall Result: ✅ SUCCESS"));

    let doc = read_json(&dir.path().join("out/results.json"));
    assert_eq!(doc["results"]["Power User: Tab Switching"]["mean"]["inp"], 42.0);
    let reports = doc["report"]["flowReports"].as_array().unwrap();
    assert_eq!(reports[0]["status"], "success");
    assert_eq!(reports[1]["status"], "skipped");
    assert_eq!(reports[1]["warnings"][0], "Unknown flow: bogus");
    assert_eq!(doc["report"]["summary"]["skippedFlows"], 1);
}

#[test]
fn failed_flow_exits_one_and_prints_json_to_stdout() {
    let dir = tempdir().unwrap();
    let recordings = json!({
        "token-send": [{ "error": "send button never enabled" }]
    });
    fs::write(dir.path().join("rec.json"), recordings.to_string()).unwrap();

    let assert = flowbench(dir.path())
        .args([
            "run",
            "--replay",
            "rec.json",
            "--flows",
            "token-send",
            "--browser-loads",
            "1",
            "--iterations",
            "1",
            "--retries",
            "0",
            "--quiet",
        ])
        .assert()
        .code(1);

    let doc: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    let report = &doc["report"]["flowReports"][0];
    assert_eq!(report["status"], "failed");
    assert_eq!(report["errors"][1], "No successful results obtained");
    assert_eq!(doc["report"]["exitCode"], 1);
    assert!(doc["results"].as_object().unwrap().is_empty());
}

#[test]
fn missing_config_is_a_config_error() {
    let dir = tempdir().unwrap();
    flowbench(dir.path())
        .args(["run", "--config", "nope.yaml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nope.yaml"));
}

#[test]
fn invalid_config_is_a_config_error() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("flowbench.yaml"), "run:\n  iterations: 0\n").unwrap();
    flowbench(dir.path())
        .args(["analyze", "whatever.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("run.iterations"));
}

#[test]
fn unwritable_output_parent_is_a_config_error() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("samples.json"), "[]").unwrap();
    fs::write(dir.path().join("blocker"), "x").unwrap();
    flowbench(dir.path())
        .args(["analyze", "samples.json", "--out", "blocker/out.json"])
        .assert()
        .code(2);
}

#[cfg(unix)]
#[test]
fn locked_output_directory_fails_before_analysis() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let sample = json!([{ "flow": "token-send", "run": 0, "metrics": { "inp": 5 }, "timestamp": 0 }]);
    fs::write(dir.path().join("samples.json"), sample.to_string()).unwrap();
    let locked = dir.path().join("out");
    fs::create_dir(&locked).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();
    let privileged = tempfile::NamedTempFile::new_in(&locked).is_ok();

    let assert = flowbench(dir.path())
        .args(["analyze", "samples.json", "--out", "out/r.json"])
        .assert();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    if privileged {
        return;
    }
    assert
        .code(2)
        .stderr(predicate::str::contains("not writable"))
        .stderr(predicate::str::contains("analyzed").not());
}

#[test]
fn version_prints_package_version() {
    let dir = tempdir().unwrap();
    flowbench(dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
