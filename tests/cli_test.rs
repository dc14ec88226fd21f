//! End-to-end tests for the `cur-assess` binary

mod common;

use assert_cmd::Command;
use common::{synthetic_export, write_export, CurBuilder};
use predicates::prelude::*;
use tempfile::tempdir;

fn cur_assess() -> Command {
    let mut cmd = Command::cargo_bin("cur-assess").unwrap();
    cmd.env("LOG_LEVEL", "ERROR").env_remove("CUR_ASSESS_MAX_RECORDS");
    cmd
}

#[test]
fn test_analyze_json_output() {
    let dir = tempdir().unwrap();
    let csv = CurBuilder::new()
        .instance("i-1", "m5.xlarge", "us-east-1", "50.00")
        .usage("AmazonS3", "bucket-1", "eu-west-1", "7.50")
        .tax("3.00")
        .build();
    let path = write_export(dir.path(), "march.csv", &csv).unwrap();

    let output = cur_assess()
        .arg("analyze")
        .arg(&path)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["assessment"]["summary"]["totalRecords"], 2);
    assert_eq!(report["parse"]["taxCost"], 3.0);
    assert_eq!(report["assessment"]["services"][0]["key"], "EC2");
}

#[test]
fn test_analyze_glob_over_several_files() {
    let dir = tempdir().unwrap();
    write_export(
        dir.path(),
        "a.csv",
        &synthetic_export(20, &[("AmazonEC2", 1.0)]),
    )
    .unwrap();
    write_export(
        dir.path(),
        "b.csv",
        &synthetic_export(10, &[("AmazonRDS", 2.0)]),
    )
    .unwrap();
    let pattern = format!("{}/*.csv", dir.path().display());

    cur_assess()
        .args(["analyze", &pattern])
        .assert()
        .success()
        .stdout(predicate::str::contains("AWS Cost and Usage Assessment"))
        .stdout(predicate::str::contains("EC2"))
        .stdout(predicate::str::contains("RDS"));
}

#[test]
fn test_analyze_with_spill_directory() {
    let dir = tempdir().unwrap();
    let spill = dir.path().join("spill");
    let path = write_export(
        dir.path(),
        "big.csv",
        &synthetic_export(40, &[("AmazonEC2", 1.0), ("AmazonS3", 1.0)]),
    )
    .unwrap();

    cur_assess()
        .env("CUR_ASSESS_OVERFLOW_THRESHOLD", "5")
        .arg("analyze")
        .arg(&path)
        .arg("--spill-dir")
        .arg(&spill)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"totalRecords\": 40"));

    let leftovers = std::fs::read_dir(&spill).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[test]
fn test_parse_command_reports_metadata() {
    let dir = tempdir().unwrap();
    let csv = CurBuilder::new()
        .usage("AmazonEC2", "i-1", "us-east-1", "10.00")
        .usage("", "orphan", "us-east-1", "1.00")
        .build();
    let path = write_export(dir.path(), "one.csv", &csv).unwrap();

    cur_assess()
        .arg("parse")
        .arg(&path)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"records\""))
        .stdout(predicate::str::contains("\"noProductCode\": 1"));
}

#[test]
fn test_missing_file_fails() {
    cur_assess()
        .args(["analyze", "/definitely/not/here-*.csv"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("No CUR files found"));
}

#[test]
fn test_record_ceiling_reports_checkpoint() {
    let dir = tempdir().unwrap();
    let path = write_export(
        dir.path(),
        "wide.csv",
        &synthetic_export(10, &[("AmazonEC2", 1.0)]),
    )
    .unwrap();

    cur_assess()
        .arg("analyze")
        .arg(&path)
        .args(["--max-records", "3"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("hint:"));

    cur_assess()
        .arg("analyze")
        .arg(&path)
        .args(["--max-records", "3", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"checkpoint\""))
        .stdout(predicate::str::contains("\"records\":4"));
}

#[test]
fn test_empty_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = write_export(dir.path(), "empty.csv", "").unwrap();

    cur_assess().arg("parse").arg(&path).assert().failure().code(1);
}
