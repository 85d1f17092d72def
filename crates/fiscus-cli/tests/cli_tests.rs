//! CLI integration tests for fiscus.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn fiscus() -> Command {
    Command::cargo_bin("fiscus").unwrap()
}

#[test]
fn test_help_flag() {
    fiscus()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Municipal finance report ETL"));
}

#[test]
fn test_version_flag() {
    fiscus()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fiscus"));
}

#[test]
fn test_no_subcommand_shows_usage() {
    fiscus()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_list_shows_groups_and_reports() {
    fiscus()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("collections:"))
        .stdout(predicate::str::contains("qcmr:"))
        .stdout(predicate::str::contains("budget:"))
        .stdout(predicate::str::contains("CityTaxCollections"))
        .stdout(predicate::str::contains("CashReportRevenue"))
        .stdout(predicate::str::contains("BudgetSummary"));
}

#[test]
fn test_etl_unknown_report_fails_with_suggestions() {
    let dir = TempDir::new().unwrap();
    fiscus()
        .env("FISCUS_DATA_ROOT", dir.path())
        .args(["etl", "NoSuchReport"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown report"))
        .stderr(predicate::str::contains("CityTaxCollections"));
}

#[test]
fn test_etl_without_matching_files_fails() {
    let dir = TempDir::new().unwrap();
    fiscus()
        .env("FISCUS_DATA_ROOT", dir.path())
        .args(["etl", "CityTaxCollections", "--year", "2021", "--month", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no raw files matched"));
}

#[test]
fn test_validate_config_ok() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fiscus.yaml");
    std::fs::write(
        &path,
        "data:\n  raw: /d/raw\n  processed: /d/processed\n  interim: /d/interim\n",
    )
    .unwrap();

    fiscus()
        .args(["validate-config", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration OK"));
}

#[test]
fn test_validate_config_rejects_bad_settings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fiscus.yaml");
    std::fs::write(
        &path,
        "data:\n  raw: /d/raw\n  processed: /d/processed\n  interim: /d/interim\n\
         remote:\n  poll_interval_secs: 0\n",
    )
    .unwrap();

    fiscus()
        .args(["validate-config", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("poll_interval"));
}
