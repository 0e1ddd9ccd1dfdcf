//! Shared helpers for CLI commands

use crate::locks::{is_process_alive, DaemonLock};
use anyhow::{Context, Result};
use journal::MetadataStore;
use rewind_core::Timestamp;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Open the metadata store at `db`, creating it if missing.
pub fn open_store(db: &Path) -> Result<MetadataStore> {
    MetadataStore::open(db).with_context(|| {
        // sled holds an exclusive lock while a watcher runs
        match DaemonLock::read(&lock_path(db)) {
            Ok(Some(lock)) if is_process_alive(lock.pid) => format!(
                "Failed to open metadata store at {}; watcher (PID {}) holds it, run `rewind stop {}` first",
                db.display(),
                lock.pid,
                db.display()
            ),
            _ => format!("Failed to open metadata store at {}", db.display()),
        }
    })
}

/// Use the given branch, or the store's active branch when none was named.
pub fn resolve_branch(store: &MetadataStore, branch: Option<String>) -> Result<String> {
    match branch {
        Some(branch) => Ok(branch),
        None => Ok(store.active_branch()?),
    }
}

pub fn parse_timestamp(input: &str) -> Result<Timestamp> {
    Timestamp::parse(input).with_context(|| format!("Invalid timestamp '{}'", input))
}

/// Lock file written by `start` next to the metadata store: `<db>.lock`
pub fn lock_path(db: &Path) -> PathBuf {
    let mut name = OsString::from(db.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

/// Absolute form of a user-supplied path, matching how captured paths are recorded.
///
/// Existing paths are canonicalized; paths that no longer exist (deleted
/// files) are resolved against their canonical parent when possible.
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    if let Ok(canonical) = path.canonicalize() {
        return Ok(canonical);
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to determine current directory")?
            .join(path)
    };

    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => match parent.canonicalize() {
            Ok(parent) => Ok(parent.join(name)),
            Err(_) => Ok(absolute),
        },
        _ => Ok(absolute),
    }
}

/// Format timestamp as relative time ("2 hours ago")
pub fn format_relative_time(timestamp: Timestamp) -> String {
    let elapsed = Timestamp::now().as_datetime() - timestamp.as_datetime();
    let seconds = elapsed.num_seconds();

    if seconds < 0 {
        "in the future".to_string()
    } else if seconds < 60 {
        format!("{} seconds ago", seconds)
    } else if seconds < 3600 {
        format!("{} minutes ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{} hours ago", seconds / 3600)
    } else if seconds < 604800 {
        format!("{} days ago", seconds / 86400)
    } else {
        format!("{} weeks ago", seconds / 604800)
    }
}

/// Shorten a content hash for display
pub fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path() {
        assert_eq!(lock_path(Path::new("/data/meta.db")), PathBuf::from("/data/meta.db.lock"));
        assert_eq!(lock_path(Path::new("meta")), PathBuf::from("meta.lock"));
    }

    #[test]
    fn test_format_relative_time() {
        let now = Timestamp::now().as_datetime();
        let ago = |delta: TimeDelta| format_relative_time(Timestamp::from_datetime(now - delta));

        assert!(ago(TimeDelta::seconds(5)).ends_with("seconds ago"));
        assert_eq!(ago(TimeDelta::minutes(3)), "3 minutes ago");
        assert_eq!(ago(TimeDelta::hours(2)), "2 hours ago");
        assert_eq!(ago(TimeDelta::days(3)), "3 days ago");
        assert_eq!(ago(TimeDelta::weeks(2)), "2 weeks ago");
        assert_eq!(ago(TimeDelta::days(-1)), "in the future");
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(short_hash("0123456789abcdef"), "0123456789ab");
        assert_eq!(short_hash("abc"), "abc");
        assert_eq!(short_hash(""), "");
    }

    #[test]
    fn test_absolute_path_of_deleted_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().canonicalize()?;

        let live = root.join("live.txt");
        std::fs::write(&live, b"x")?;
        assert_eq!(absolute_path(&live)?, live);

        let gone = temp_dir.path().join("gone.txt");
        assert_eq!(absolute_path(&gone)?, root.join("gone.txt"));
        Ok(())
    }

    #[test]
    fn test_parse_timestamp_error_names_input() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert!(err.to_string().contains("yesterday"));
    }
}
