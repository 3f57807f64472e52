//! CLI integration tests for proplock
//!
//! Tests the proplock CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::process::{Command as StdCommand, Stdio};
use std::time::Duration;
use tempfile::TempDir;

/// Helper to create a command with an isolated config directory
#[allow(deprecated)]
fn proplock_cmd(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("proplock").unwrap();
    cmd.env("PROPLOCK_CONFIG_DIR", config_dir.path());
    cmd
}

#[test]
fn test_help_lists_commands() {
    let temp_dir = TempDir::new().unwrap();

    proplock_cmd(&temp_dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_config_path_uses_config_dir() {
    let temp_dir = TempDir::new().unwrap();

    proplock_cmd(&temp_dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"))
        .stdout(predicate::str::contains(
            temp_dir.path().to_string_lossy().to_string(),
        ));
}

#[test]
fn test_config_list_shows_defaults() {
    let temp_dir = TempDir::new().unwrap();

    proplock_cmd(&temp_dir)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("server.bind_addr = 127.0.0.1:5080"))
        .stdout(predicate::str::contains("server.max_line_bytes = 8192"))
        .stdout(predicate::str::contains("hub.outbound_buffer = 256"));
}

#[test]
fn test_config_set_then_get() {
    let temp_dir = TempDir::new().unwrap();

    proplock_cmd(&temp_dir)
        .args(["config", "set", "server.bind_addr", "0.0.0.0:7000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set server.bind_addr = 0.0.0.0:7000"));

    assert!(temp_dir.path().join("config.toml").exists());

    proplock_cmd(&temp_dir)
        .args(["config", "get", "server.bind_addr"])
        .assert()
        .success()
        .stdout(predicate::str::diff("0.0.0.0:7000\n"));
}

#[test]
fn test_config_reset_restores_defaults() {
    let temp_dir = TempDir::new().unwrap();

    proplock_cmd(&temp_dir)
        .args(["--quiet", "config", "set", "hub.outbound_buffer", "8"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    proplock_cmd(&temp_dir)
        .args(["config", "reset"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reset to defaults"));

    proplock_cmd(&temp_dir)
        .args(["config", "get", "hub.outbound_buffer"])
        .assert()
        .success()
        .stdout(predicate::str::diff("256\n"));
}

#[test]
fn test_config_rejects_invalid_values() {
    let temp_dir = TempDir::new().unwrap();

    proplock_cmd(&temp_dir)
        .args(["config", "set", "hub.outbound_buffer", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("greater than 0"));

    proplock_cmd(&temp_dir)
        .args(["config", "get", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));
}

#[test]
fn test_serve_rejects_bad_bind_address() {
    let temp_dir = TempDir::new().unwrap();

    proplock_cmd(&temp_dir)
        .args(["serve", "--bind", "not-an-address"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid bind address"));
}

#[test]
#[allow(deprecated)]
fn test_serve_accepts_clients() {
    let temp_dir = TempDir::new().unwrap();
    let bin = assert_cmd::cargo::cargo_bin("proplock");

    let mut child = StdCommand::new(bin)
        .env("PROPLOCK_CONFIG_DIR", temp_dir.path())
        .env("RUST_LOG", "off")
        .args(["serve", "--bind", "127.0.0.1:0"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let mut stdout = BufReader::new(child.stdout.take().unwrap());
    let mut banner = String::new();
    stdout.read_line(&mut banner).unwrap();
    let addr = banner
        .trim()
        .strip_prefix("Listening on ")
        .expect("missing listen banner")
        .to_string();

    let stream = TcpStream::connect(&addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);

    let mut greeting = String::new();
    reader.read_line(&mut greeting).unwrap();
    assert!(greeting.contains("\"Connected\""));

    writer
        .write_all(b"{\"method\":\"LockProperty\",\"propertyId\":\"P1\"}\n")
        .unwrap();
    let mut locked = String::new();
    reader.read_line(&mut locked).unwrap();
    assert!(locked.contains("\"PropertyLocked\""));
    assert!(locked.contains("\"P1\""));

    child.kill().unwrap();
    child.wait().unwrap();
}
