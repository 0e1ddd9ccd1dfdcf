//! Lock file management for watcher exclusivity
//!
//! `start` holds `<db>.lock` (flock + JSON `{pid, started_at}`) for as long
//! as it runs; `stop` reads the pid from it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Daemon lock file structure
pub struct DaemonLock {
    path: PathBuf,
    #[allow(dead_code)]
    file: File,
}

/// Lock file content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockContent {
    pub pid: u32,
    pub started_at: u64,
}

impl DaemonLock {
    /// Acquire exclusive daemon lock
    ///
    /// Returns error if:
    /// - Lock is already held by a running process
    /// - Permission denied
    pub fn acquire(lock_path: &Path) -> Result<Self> {
        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(lock_path)
            .with_context(|| format!("Failed to open lock file {}", lock_path.display()))?;

        // Try to acquire exclusive lock (non-blocking)
        if !try_flock_exclusive(&file)? {
            if Self::is_stale_lock(&mut file) {
                tracing::warn!("Removing stale lock {}", lock_path.display());
                drop(file);
                std::fs::remove_file(lock_path)?;
                return Self::acquire(lock_path);
            }

            let holder = Self::read_lock_content(&mut file)
                .map(|content| format!(" (pid {})", content.pid))
                .unwrap_or_default();
            anyhow::bail!("Watcher already running{}; lock held at {}", holder, lock_path.display());
        }

        Self::write_lock_content(&mut file)?;

        Ok(Self {
            path: lock_path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the content of a lock file, `None` if there is no lock file
    pub fn read(lock_path: &Path) -> Result<Option<LockContent>> {
        let mut file = match File::open(lock_path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to open lock file {}", lock_path.display()))
            }
        };
        Self::read_lock_content(&mut file).map(Some)
    }

    /// Check if lock file represents a stale lock
    fn is_stale_lock(file: &mut File) -> bool {
        match Self::read_lock_content(file) {
            Ok(content) => !is_process_alive(content.pid),
            // Holder may still be writing its pid
            Err(_) => false,
        }
    }

    /// Write lock content (PID + timestamp)
    fn write_lock_content(file: &mut File) -> Result<()> {
        let content = LockContent {
            pid: std::process::id(),
            started_at: current_timestamp_ms(),
        };

        let serialized =
            serde_json::to_string(&content).context("Failed to serialize lock content")?;

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(serialized.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    fn read_lock_content(file: &mut File) -> Result<LockContent> {
        file.seek(SeekFrom::Start(0))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        let content: LockContent =
            serde_json::from_str(&contents).context("Failed to deserialize lock content")?;
        Ok(content)
    }
}

impl Drop for DaemonLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Try to acquire exclusive file lock (non-blocking)
fn try_flock_exclusive(file: &File) -> Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Check if process is alive
pub fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // Signal 0 checks existence without delivering anything
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(_) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        Err(_) => true,
    }
}

/// Get current timestamp in milliseconds
fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_records_pid_and_is_removed_on_drop() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let lock_path = temp_dir.path().join("meta.db.lock");

        let lock = DaemonLock::acquire(&lock_path)?;
        assert_eq!(lock.path(), lock_path);

        let content = DaemonLock::read(&lock_path)?.expect("lock content");
        assert_eq!(content.pid, std::process::id());
        assert!(content.started_at > 0);

        drop(lock);
        assert!(!lock_path.exists());
        assert!(DaemonLock::read(&lock_path)?.is_none());
        Ok(())
    }

    #[test]
    fn test_second_acquire_fails_while_held() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let lock_path = temp_dir.path().join("meta.db.lock");

        let _lock = DaemonLock::acquire(&lock_path)?;
        let err = DaemonLock::acquire(&lock_path).err().expect("second acquire must fail");
        assert!(err.to_string().contains("already running"));
        Ok(())
    }

    #[test]
    fn test_unlocked_leftover_file_is_reused() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let lock_path = temp_dir.path().join("meta.db.lock");
        std::fs::write(&lock_path, r#"{"pid":1,"started_at":1}"#)?;

        let _lock = DaemonLock::acquire(&lock_path)?;
        let content = DaemonLock::read(&lock_path)?.expect("lock content");
        assert_eq!(content.pid, std::process::id());
        Ok(())
    }

    #[test]
    fn test_current_process_is_alive() {
        assert!(is_process_alive(std::process::id()));
    }
}
