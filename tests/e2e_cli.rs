//! CLI end-to-end tests

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the mediagate binary
#[allow(deprecated)]
fn mediagate_cmd() -> Command {
    Command::cargo_bin("mediagate").unwrap()
}

#[test]
fn test_cli_no_args_shows_help() {
    mediagate_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_lists_commands() {
    mediagate_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("check-tools"));
}

#[test]
fn test_cli_version_command() {
    mediagate_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "mediagate {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_cli_validate_valid_config() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("mediagate.toml");
    fs::write(
        &config_path,
        r#"
[server]
host = "0.0.0.0"
port = 9000

[transcode]
hw_accel = "none"

[[remote_sources]]
id = "nas"
host = "nas.local"
username = "bob"
password = "secret"

[[remote_sources]]
id = "vault"
host = "vault.local"
secure = true
"#,
    )
    .unwrap();

    mediagate_cmd()
        .arg("validate")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("0.0.0.0:9000"))
        .stdout(predicate::str::contains("Remote sources: 2"))
        .stdout(predicate::str::contains("vault -> vault.local:21 (FTPS)"))
        .stdout(predicate::str::contains("secret").not());
}

#[test]
fn test_cli_validate_rejects_duplicate_sources() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("mediagate.toml");
    fs::write(
        &config_path,
        r#"
[[remote_sources]]
id = "nas"
host = "a.local"

[[remote_sources]]
id = "nas"
host = "b.local"
"#,
    )
    .unwrap();

    mediagate_cmd()
        .arg("validate")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .failure();
}

#[test]
fn test_cli_validate_rejects_malformed_toml() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("broken.toml");
    fs::write(&config_path, "[server\nport = ").unwrap();

    mediagate_cmd()
        .arg("validate")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .failure();
}

#[test]
fn test_cli_probe_missing_file_fails() {
    mediagate_cmd()
        .arg("probe")
        .arg("/nonexistent/film.mkv")
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_check_tools_reports_engines() {
    mediagate_cmd()
        .arg("check-tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("ffmpeg"))
        .stdout(predicate::str::contains("ffprobe"));
}
