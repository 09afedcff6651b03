use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_config_path_command() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("finchat")
        .env("FINCHAT_HOME", dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_creates_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    assert!(!config_path.exists());

    cargo_bin_cmd!("finchat")
        .env("FINCHAT_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config at"));

    assert!(config_path.exists());

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains("model ="));
    assert!(contents.contains("# max_tokens ="));
}

#[test]
fn test_config_init_fails_if_exists() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    fs::write(&config_path, "# existing config").unwrap();

    cargo_bin_cmd!("finchat")
        .env("FINCHAT_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_dataset_summary_uses_bundled_sample() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("finchat")
        .env("FINCHAT_HOME", dir.path())
        .args(["dataset", "summary"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions:"))
        .stdout(predicate::str::contains("Total income:"))
        .stdout(predicate::str::contains("Top expense categories:"));
}

#[test]
fn test_dataset_path_reports_missing_user_file() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("finchat")
        .env("FINCHAT_HOME", dir.path())
        .args(["dataset", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("transactions.json"))
        .stdout(predicate::str::contains("bundled sample"));
}

#[test]
fn test_dataset_summary_prefers_user_file() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("transactions.json"),
        r#"[{"date":"2025-01-01","description":"Salary","category":"Salary","amount":100.0,"type":"income"}]"#,
    )
    .unwrap();

    cargo_bin_cmd!("finchat")
        .env("FINCHAT_HOME", dir.path())
        .args(["dataset", "summary"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions:   1"))
        .stdout(predicate::str::contains("Total income:   $100.00"));
}
