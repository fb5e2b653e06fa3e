//! CLI smoke tests for the `fastlm` binary

use assert_cmd::Command;
use predicates::prelude::*;

fn fastlm() -> Command {
    Command::cargo_bin("fastlm").expect("binary built")
}

#[test]
fn test_export_run_info() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("model.bin");

    fastlm()
        .args(["export", path.to_str().expect("utf8 path"), "--d-model", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Model saved"));

    fastlm()
        .args(["run", path.to_str().expect("utf8 path")])
        .assert()
        .success()
        .stdout(predicate::str::contains("--- Final Output [3x4] ---"))
        .stdout(predicate::str::contains("Inference time:"));

    fastlm()
        .args(["info", path.to_str().expect("utf8 path")])
        .assert()
        .success()
        .stdout(predicate::str::contains("d_model: 4"))
        .stdout(predicate::str::contains("Status: complete"));
}

#[test]
fn test_run_json_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("model.bin");
    fastlm()
        .args(["export", path.to_str().expect("utf8 path"), "--d-model", "2"])
        .assert()
        .success();

    let output = fastlm()
        .args(["run", path.to_str().expect("utf8 path"), "-n", "2", "--format", "json"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(report["seq_len"], 2);
    assert_eq!(report["output"]["rows"], 2);
    assert_eq!(report["output"]["cols"], 2);
}

#[test]
fn test_run_missing_file_fails() {
    fastlm()
        .args(["run", "/nonexistent/model.bin"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Cannot open model file"));
}

#[test]
fn test_run_bad_magic_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bad.bin");
    let mut bytes = 0xDEAD_BEEF_u32.to_le_bytes().to_vec();
    bytes.extend_from_slice(&[0u8; 8]);
    std::fs::write(&path, bytes).expect("write");

    fastlm()
        .args(["run", path.to_str().expect("utf8 path")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid model format"))
        .stdout(predicate::str::contains("Final Output").not());
}

#[test]
fn test_info_huge_header_does_not_panic() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("huge.bin");
    let mut bytes = 0xFEED_BEEF_u32.to_le_bytes().to_vec();
    bytes.extend_from_slice(&i32::MAX.to_le_bytes());
    bytes.extend_from_slice(&i32::MAX.to_le_bytes());
    std::fs::write(&path, bytes).expect("write");

    fastlm()
        .args(["info", path.to_str().expect("utf8 path")])
        .assert()
        .success()
        .stdout(predicate::str::contains("Status: out of range"));
}

#[test]
fn test_run_stacked_uses_every_block() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("stack.bin");
    fastlm()
        .args(["export", path.to_str().expect("utf8 path"), "--d-model", "2", "--layers", "3"])
        .assert()
        .success();

    let run = |extra: &[&str]| -> serde_json::Value {
        let mut args = vec!["run", path.to_str().expect("utf8 path"), "--format", "json"];
        args.extend_from_slice(extra);
        let output = fastlm().args(&args).output().expect("run");
        assert!(output.status.success());
        serde_json::from_slice(&output.stdout).expect("json")
    };

    let single = run(&[]);
    assert_eq!(single["layers"], 1);
    assert_eq!(single["declared_layers"], 3);

    let stacked = run(&["--stacked"]);
    assert_eq!(stacked["layers"], 3);
}
