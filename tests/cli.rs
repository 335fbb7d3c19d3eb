use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn cli_shows_help() {
    let mut cmd = Command::cargo_bin("ine").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Statistics Portugal"))
        .stdout(predicate::str::contains("download"));
}

#[test]
fn download_help_lists_dimension_flag() {
    let mut cmd = Command::cargo_bin("ine").unwrap();
    cmd.args(["download", "--help"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--dim"))
        .stdout(predicate::str::contains("--chunk-size"))
        .stdout(predicate::str::contains("--x <X>"))
        .stdout(predicate::str::contains("--y <Y>"));
}

#[test]
fn malformed_dimension_key_fails_before_any_request() {
    let mut cmd = Command::cargo_bin("ine").unwrap();
    cmd.args(["--no-cache", "download", "0004167", "-d", "Region=PT"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid dimension key: Region"));
}

#[test]
fn dimension_without_value_is_rejected() {
    let mut cmd = Command::cargo_bin("ine").unwrap();
    cmd.args(["--no-cache", "download", "0004167", "-d", "Dim1"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("DimN=value"));
}

#[test]
fn unknown_chart_type_is_a_usage_error() {
    let mut cmd = Command::cargo_bin("ine").unwrap();
    cmd.args(["download", "0004167", "--chart", "pie"]);
    cmd.assert().failure().code(2);
}

// Live test (opt-in): cargo test --features online
#[cfg(feature = "online")]
#[test]
fn download_online_population() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("pop.csv");
    let mut cmd = Command::cargo_bin("ine").unwrap();
    cmd.args(["--no-cache", "download", "0004167", "--stats", "-o"])
        .arg(&out);
    cmd.assert().success();
    assert!(out.exists());
}
