//! CLI argument handling tests for the `pd` binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `pd` with logs and runtime files kept inside a temp dir
fn pd(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pd").unwrap();
    cmd.env("XDG_DATA_HOME", temp.path().join("data"))
        .env("XDG_RUNTIME_DIR", temp.path().join("run"))
        .env("XDG_CONFIG_HOME", temp.path().join("config"))
        .current_dir(temp.path());
    cmd
}

#[test]
fn test_help_lists_commands() {
    let temp = TempDir::new().unwrap();
    pd(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("wait"))
        .stdout(predicate::str::contains("Logs are written to"));
}

#[test]
fn test_version() {
    let temp = TempDir::new().unwrap();
    pd(&temp)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_pair_requires_name() {
    let temp = TempDir::new().unwrap();
    pd(&temp).arg("pair").assert().failure();
}

#[test]
fn test_unknown_stats_format_rejected() {
    let temp = TempDir::new().unwrap();
    pd(&temp)
        .args(["stats", "--format", "table"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown format"));
}

#[test]
fn test_pair_without_daemon_fails_with_hint() {
    let temp = TempDir::new().unwrap();
    pd(&temp)
        .args(["pair", "Alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pd serve"));
}

#[test]
fn test_stop_without_daemon_is_harmless() {
    let temp = TempDir::new().unwrap();
    pd(&temp)
        .arg("stop")
        .assert()
        .success()
        .stdout(predicate::str::contains("not running"));
}

#[test]
fn test_explicit_missing_config_fails() {
    let temp = TempDir::new().unwrap();
    pd(&temp)
        .args(["--config", "missing.yml", "ping"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}
