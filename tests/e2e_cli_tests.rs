// ABOUTME: End-to-end tests running the rbox binary against configuration problems
// No network is touched: every case fails before a connection is attempted

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const MISSING_AUTH: &str = "[server]\naddress = \"host\"\nport = 22\nusername = \"me\"\n";

fn rbox(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_rbox"));
    cmd.env("HOME", home)
        .env("XDG_DATA_HOME", home.join("data"))
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("NO_COLOR", "1")
        .env("RUST_LOG", "error");
    cmd
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("failed to run rbox binary")
}

#[test]
fn test_missing_auth_section_exits_with_failure() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("config.toml");
    std::fs::write(&config, MISSING_AUTH).unwrap();

    let output = run(rbox(home.path()).arg("--config").arg(&config).arg("ls"));

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Configuration error"), "{stderr}");
    assert!(stderr.contains("Review config file"), "{stderr}");
}

#[test]
fn test_unreadable_config_path_exits_with_failure() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("does-not-exist.toml");

    let output = run(rbox(home.path()).arg("--config").arg(&config).arg("ls"));

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read config file"), "{stderr}");
}

#[test]
fn test_command_is_required() {
    let home = TempDir::new().unwrap();
    let output = run(&mut rbox(home.path()));

    assert_eq!(output.status.code(), Some(2));
}

#[test]
#[ignore] // Run with: cargo test --test e2e_cli_tests -- --ignored
fn test_pty_session_reports_config_error() -> Result<(), Box<dyn std::error::Error>> {
    let home = TempDir::new()?;
    let config = home.path().join("config.toml");
    std::fs::write(&config, MISSING_AUTH)?;

    let mut cmd = rbox(home.path());
    cmd.arg("--config").arg(&config).arg("ls");

    let mut session = rexpect::session::spawn_command(cmd, Some(15_000))?;
    session.exp_string("Configuration error")?;
    session.exp_string("Review config file")?;
    session.exp_eof()?;
    Ok(())
}
