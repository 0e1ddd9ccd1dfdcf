//! Tests for config command

use anyhow::Result;
use std::process::Command;
use tempfile::TempDir;

/// Run `rewind config ...` with HOME pointed at `home`
fn config_cmd(home: &TempDir, args: &[&str]) -> Result<std::process::Output> {
    Ok(Command::new(env!("CARGO_BIN_EXE_rewind"))
        .env("HOME", home.path())
        .arg("config")
        .args(args)
        .output()?)
}

#[test]
fn test_config_list() -> Result<()> {
    let home = TempDir::new()?;
    let output = config_cmd(&home, &["--list"])?;

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("[capture]"));
    assert!(stdout.contains("[watcher]"));
    assert!(stdout.contains("workers = 4"));
    assert!(stdout.contains("queue_depth = 256"));
    assert!(stdout.contains("poll_interval_ms = 50"));

    Ok(())
}

#[test]
fn test_config_get() -> Result<()> {
    let home = TempDir::new()?;
    let output = config_cmd(&home, &["--get", "capture.workers"])?;

    assert!(output.status.success());
    let value: usize = String::from_utf8_lossy(&output.stdout).trim().parse()?;
    assert_eq!(value, 4);

    Ok(())
}

#[test]
fn test_config_get_reads_user_file() -> Result<()> {
    let home = TempDir::new()?;
    let config_dir = home.path().join(".config/rewind");
    std::fs::create_dir_all(&config_dir)?;
    std::fs::write(config_dir.join("config.toml"), "[capture]\nworkers = 9\n")?;

    let output = config_cmd(&home, &["--get", "capture.workers"])?;
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "9");

    // Unset keys keep their defaults
    let output = config_cmd(&home, &["--get", "capture.queue_depth"])?;
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "256");

    Ok(())
}

#[test]
fn test_config_malformed_file_uses_defaults() -> Result<()> {
    let home = TempDir::new()?;
    let config_dir = home.path().join(".config/rewind");
    std::fs::create_dir_all(&config_dir)?;
    std::fs::write(config_dir.join("config.toml"), "[capture\nnot toml")?;

    let output = config_cmd(&home, &["--get", "capture.workers"])?;
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "4");

    Ok(())
}

#[test]
fn test_config_get_unknown_key() -> Result<()> {
    let home = TempDir::new()?;
    let output = config_cmd(&home, &["--get", "capture.unknown_key"])?;

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown config key"));

    Ok(())
}
