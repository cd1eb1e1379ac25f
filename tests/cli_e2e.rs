//! End-to-end CLI tests for the noveldl binary.

#![allow(clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn noveldl() -> Command {
    Command::cargo_bin("noveldl").unwrap()
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    noveldl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Download serialized web novels"))
        .stdout(predicate::str::contains("--base-url"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    noveldl()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("noveldl"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    noveldl()
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_binary_without_work_id_fails() {
    noveldl()
        .args(["--base-url", "https://novels.example"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("WORK_ID"));
}

#[test]
fn test_binary_concurrency_out_of_range_fails() {
    noveldl()
        .args(["--base-url", "https://novels.example", "-c", "64", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("64"));
}

#[test]
fn test_binary_rejects_non_http_base_url() {
    let output = tempfile::tempdir().unwrap();
    noveldl()
        .args(["--base-url", "ftp://novels.example", "-q", "-o"])
        .arg(output.path())
        .arg("42")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid base URL"));
}

#[test]
fn test_binary_list_empty_output_dir() {
    let output = tempfile::tempdir().unwrap();
    noveldl()
        .arg("--list")
        .arg("-o")
        .arg(output.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No downloaded works"));
}

#[test]
fn test_binary_list_missing_output_dir() {
    let output = tempfile::tempdir().unwrap();
    noveldl()
        .arg("--list")
        .arg("-o")
        .arg(output.path().join("absent"))
        .assert()
        .success()
        .stdout(predicate::str::contains("No downloaded works"));
}

#[test]
fn test_binary_list_shows_merged_works() {
    let output = tempfile::tempdir().unwrap();
    let work_dir = output.path().join("42_Book Title");
    std::fs::create_dir(&work_dir).unwrap();
    std::fs::write(work_dir.join("Book Title_complete.txt"), "Book Title\n\n").unwrap();
    std::fs::create_dir(output.path().join("7_Unmerged")).unwrap();

    noveldl()
        .arg("--list")
        .arg("-o")
        .arg(output.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Book Title"))
        .stdout(predicate::str::contains("Unmerged").not());
}

/// Test that an unreachable site ends with a non-zero exit.
#[test]
fn test_binary_unreachable_site_exits_nonzero() {
    let output = tempfile::tempdir().unwrap();
    noveldl()
        .args(["--base-url", "http://127.0.0.1:1", "-r", "1", "--connect-timeout", "2", "-o"])
        .arg(output.path())
        .arg("42")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Download failed"));
}
