//! Platform file watching backends
//!
//! Provides a unified interface (PlatformWatcher trait) over the OS
//! notification APIs. The native backend uses `notify`'s recommended watcher
//! (inotify on Linux, FSEvents on macOS, ReadDirectoryChangesW on Windows).

pub mod native;

use crate::WatcherConfig;
use anyhow::Result;
use async_trait::async_trait;
use rewind_core::FsEvent;
use std::path::Path;

pub use native::{convert_event, NativeWatcher};

/// Platform-agnostic file system watcher interface
#[async_trait]
pub trait PlatformWatcher: Send + Sync {
    /// Start watching the configured root recursively
    async fn start(&mut self) -> Result<()>;

    /// Stop watching. No new events are queued afterwards.
    async fn stop(&mut self) -> Result<()>;

    /// Events converted from the next queued OS notification (non-blocking).
    ///
    /// Returns `None` when nothing is queued. One notification may yield
    /// zero, one, or two events.
    async fn poll_events(&mut self) -> Result<Option<Vec<FsEvent>>>;

    fn is_running(&self) -> bool;
}

/// Create the watcher backend for the current platform
pub fn create_platform_watcher(
    root: &Path,
    config: &WatcherConfig,
) -> Result<Box<dyn PlatformWatcher>> {
    Ok(Box::new(NativeWatcher::new(root, config)?))
}
