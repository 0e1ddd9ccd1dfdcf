//! System-wide configuration for rewind
//!
//! Stored at `~/.config/rewind/config.toml`. Every field has a default, so a
//! missing file, a missing section or a missing key all fall back quietly.

use anyhow::{Context, Result};
use journal::CapturePoolConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use watcher::WatcherConfig;

/// System-wide rewind configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Capture worker pool
    pub capture: CaptureConfig,

    /// Filesystem watcher
    pub watcher: WatchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Number of capture workers (default: 4)
    pub workers: usize,

    /// Queued events per worker before the watcher waits (default: 256)
    pub queue_depth: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        let pool = CapturePoolConfig::default();
        Self {
            workers: pool.workers,
            queue_depth: pool.queue_depth,
        }
    }
}

impl CaptureConfig {
    pub fn to_pool_config(&self) -> CapturePoolConfig {
        CapturePoolConfig {
            workers: self.workers,
            queue_depth: self.queue_depth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Idle poll interval in milliseconds (default: 50)
    pub poll_interval_ms: u64,

    /// Path components never captured (default: [".git"])
    pub ignore: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        let watcher = WatcherConfig::default();
        Self {
            poll_interval_ms: watcher.poll_interval.as_millis() as u64,
            ignore: watcher.ignore,
        }
    }
}

impl WatchConfig {
    /// Watcher settings, with the engine's own files excluded
    pub fn to_watcher_config(&self, exclude: Vec<PathBuf>) -> WatcherConfig {
        WatcherConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            ignore: self.ignore.clone(),
            exclude,
        }
    }
}

impl SystemConfig {
    /// Look up a value by dotted key, e.g. `capture.workers`
    pub fn get(&self, key: &str) -> Option<String> {
        let mut value = toml::Value::try_from(self).ok()?;
        for part in key.split('.') {
            value = value.as_table()?.get(part)?.clone();
        }

        match value {
            toml::Value::String(s) => Some(s),
            toml::Value::Table(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize system config")
    }
}

/// Get the system config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".config/rewind"))
}

/// Get the system config file path
pub fn config_file_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load system configuration
///
/// Returns default config if the file doesn't exist or can't be parsed.
pub fn load() -> SystemConfig {
    match config_file_path() {
        Some(path) => load_from(&path),
        None => {
            tracing::debug!("Could not determine config directory, using defaults");
            SystemConfig::default()
        }
    }
}

/// Load configuration from an explicit file
pub fn load_from(path: &Path) -> SystemConfig {
    if !path.exists() {
        tracing::debug!("System config not found at {}, using defaults", path.display());
        return SystemConfig::default();
    }

    match parse_file(path) {
        Ok(config) => {
            tracing::debug!("Loaded system config from {}", path.display());
            config
        }
        Err(e) => {
            tracing::warn!("{:#}; using defaults", e);
            SystemConfig::default()
        }
    }
}

fn parse_file(path: &Path) -> Result<SystemConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read system config at {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse system config at {}", path.display()))
}
