//! Stop a running watcher

use crate::locks::{self, DaemonLock};
use crate::util;
use anyhow::{Context, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use owo_colors::OwoColorize;
use std::path::Path;
use std::time::Duration;

const STOP_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run(db: Option<&Path>) -> Result<()> {
    let Some(db) = db else {
        println!("The watcher runs in the foreground of `rewind start`.");
        println!("Press Ctrl+C in that terminal, or run: rewind stop <db>");
        return Ok(());
    };

    let lock_path = util::lock_path(db);
    let Some(content) = DaemonLock::read(&lock_path)? else {
        println!("No watcher is running for {}", db.display());
        return Ok(());
    };

    if !locks::is_process_alive(content.pid) {
        std::fs::remove_file(&lock_path)
            .with_context(|| format!("Failed to remove stale lock {}", lock_path.display()))?;
        println!("No watcher is running for {} (removed stale lock)", db.display());
        return Ok(());
    }

    println!("{} Stopping watcher (PID: {})...", "→".cyan(), content.pid);
    kill(Pid::from_raw(content.pid as i32), Signal::SIGTERM)
        .with_context(|| format!("Failed to signal process {}", content.pid))?;

    // The watcher removes its lock once every queued capture is written
    let deadline = tokio::time::Instant::now() + STOP_TIMEOUT;
    while lock_path.exists() && locks::is_process_alive(content.pid) {
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!(
                "Watcher (PID: {}) did not exit within {}s",
                content.pid,
                STOP_TIMEOUT.as_secs()
            );
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    println!("{} Watcher stopped", "✓".green());
    Ok(())
}
