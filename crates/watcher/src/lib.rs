//! File system watching for rewind
//!
//! This crate provides the event source for change capture:
//! - Recursive watching under one root via the platform backend
//! - Conversion of OS notifications into `FsEvent`s
//! - Filtering of ignored components and engine-owned paths

pub mod filter;
pub mod platform;

pub use filter::EventFilter;

use anyhow::{Context, Result};
use rewind_core::FsEvent;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Configuration for the file system watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Sleep between polls when no events are queued (default: 50ms)
    pub poll_interval: Duration,

    /// Path components never reported (default: `.git`)
    pub ignore: Vec<String>,

    /// Subtrees never reported, e.g. the metadata store and snapshot directory
    pub exclude: Vec<PathBuf>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            ignore: vec![".git".to_string()],
            exclude: Vec::new(),
        }
    }
}

/// Counters for watcher activity
#[derive(Debug, Default)]
pub struct WatcherMetrics {
    /// Events converted from OS notifications
    events_received: AtomicU64,

    /// Events dropped by the filter
    events_filtered: AtomicU64,

    /// Events handed to the caller
    events_emitted: AtomicU64,
}

impl WatcherMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filtered(&self) {
        self.events_filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_emitted(&self) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> WatcherMetricsSnapshot {
        WatcherMetricsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_filtered: self.events_filtered.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of watcher metrics at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatcherMetricsSnapshot {
    pub events_received: u64,
    pub events_filtered: u64,
    pub events_emitted: u64,
}

/// File system watcher coordinator
///
/// Platform Watcher → Filter → pending queue → `next_event`
pub struct Watcher {
    /// Root path being watched (canonical)
    root: PathBuf,

    config: WatcherConfig,

    filter: EventFilter,

    platform_watcher: Option<Box<dyn platform::PlatformWatcher>>,

    /// Converted events not yet handed out
    pending: VecDeque<FsEvent>,

    is_running: bool,

    metrics: WatcherMetrics,
}

impl Watcher {
    /// Create a watcher for an existing directory
    pub fn new(root: &Path, config: WatcherConfig) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("Failed to resolve watch root {}", root.display()))?;
        if !root.is_dir() {
            anyhow::bail!("{} is not a directory", root.display());
        }

        let filter = EventFilter::new(config.ignore.iter().cloned(), config.exclude.clone());

        Ok(Self {
            root,
            config,
            filter,
            platform_watcher: None,
            pending: VecDeque::new(),
            is_running: false,
            metrics: WatcherMetrics::new(),
        })
    }

    /// Get the root path being watched
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    pub fn metrics(&self) -> &WatcherMetrics {
        &self.metrics
    }

    /// Start watching for events
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running {
            return Ok(());
        }

        let mut platform_watcher = platform::create_platform_watcher(&self.root, &self.config)?;
        platform_watcher.start().await?;

        self.platform_watcher = Some(platform_watcher);
        self.is_running = true;
        tracing::info!("Watching {}", self.root.display());
        Ok(())
    }

    /// Stop watching. Events already queued are still returned by `next_event`.
    pub async fn stop(&mut self) -> Result<()> {
        if !self.is_running {
            return Ok(());
        }

        if let Some(mut watcher) = self.platform_watcher.take() {
            watcher.stop().await?;
        }

        self.is_running = false;
        Ok(())
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the watcher is stopped and nothing is pending.
    /// Cancel-safe: an event is never lost if this future is dropped.
    pub async fn next_event(&mut self) -> Result<Option<FsEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }

            let Some(watcher) = self.platform_watcher.as_mut() else {
                return Ok(None);
            };

            match watcher.poll_events().await? {
                Some(events) => {
                    for event in events {
                        self.metrics.record_received();
                        if self.filter.is_filtered(event.path()) {
                            self.metrics.record_filtered();
                            continue;
                        }
                        self.metrics.record_emitted();
                        self.pending.push_back(event);
                    }
                }
                None => tokio::time::sleep(self.config.poll_interval).await,
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }
}
