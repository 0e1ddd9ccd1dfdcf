//! Watch loop: filesystem events in, captured history out

use crate::locks::DaemonLock;
use crate::system_config::SystemConfig;
use crate::util;
use anyhow::{Context, Result};
use journal::{CapturePool, ChangeCapture, MetadataStore};
use owo_colors::OwoColorize;
use rewind_core::SnapshotStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use watcher::Watcher;

/// Paths the watcher must never report: the engine's own files
fn engine_paths(db: &Path, snapshot_dir: &Path, lock: &Path) -> Result<Vec<PathBuf>> {
    [db, snapshot_dir, lock]
        .iter()
        .map(|p| {
            p.canonicalize()
                .with_context(|| format!("Failed to resolve {}", p.display()))
        })
        .collect()
}

/// Watch `dir` and capture changes into `db`/`snapshot_dir` until SIGINT or SIGTERM.
pub async fn run(dir: &Path, db: &Path, snapshot_dir: &Path, config: SystemConfig) -> Result<()> {
    // Install handlers before `stop` can find the lock
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let lock = DaemonLock::acquire(&util::lock_path(db))?;

    let metadata = Arc::new(util::open_store(db)?);
    metadata.init()?;
    let snapshots = Arc::new(
        SnapshotStore::open(snapshot_dir)
            .with_context(|| format!("Failed to open snapshot directory {}", snapshot_dir.display()))?,
    );

    let branch = metadata.active_branch()?;
    let capture = Arc::new(ChangeCapture::new(
        Arc::clone(&metadata),
        Arc::clone(&snapshots),
        branch.clone(),
    )?);

    let exclude = engine_paths(db, snapshot_dir, lock.path())?;
    let mut watcher = Watcher::new(dir, config.watcher.to_watcher_config(exclude))?;

    let pool = CapturePool::start(Arc::clone(&capture), config.capture.to_pool_config());
    watcher.start().await?;

    tracing::info!("Watcher started (PID: {})", std::process::id());
    println!(
        "{} Watching {} on branch {}",
        "→".cyan(),
        watcher.root().display(),
        branch.bold()
    );
    println!(
        "  {}",
        format!("Queries need the store: run `rewind stop {}` first", db.display()).dimmed()
    );

    let loop_result = loop {
        tokio::select! {
            event = watcher.next_event() => match event {
                Ok(Some(event)) => pool.dispatch(event).await,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e.context("Filesystem watcher failed")),
            },
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, shutting down");
                break Ok(());
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, shutting down");
                break Ok(());
            }
        }
    };

    // Graceful shutdown: queued captures finish before the store is flushed
    if let Err(e) = watcher.stop().await {
        tracing::warn!("Failed to stop watcher: {:#}", e);
    }
    pool.shutdown().await;
    metadata.flush()?;

    let stats = capture.stats().snapshot();
    let events = watcher.metrics().snapshot();
    tracing::info!(
        "Watcher stopped: {} events, {} captured, {} deleted, {} ignored, {} failed",
        events.events_emitted,
        stats.captured,
        stats.tombstoned,
        stats.ignored,
        stats.failed
    );
    println!("{} Stopped", "✓".green());

    // Close the store before the lock goes away; `stop` returns once the lock is gone
    drop(capture);
    drop(metadata);
    drop(lock);
    loop_result
}
