//! Native backend over `notify`'s recommended watcher

use super::PlatformWatcher;
use crate::WatcherConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{
    Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher,
};
use rewind_core::FsEvent;
use std::path::{Path, PathBuf};

pub struct NativeWatcher {
    root: PathBuf,
    watcher: Option<RecommendedWatcher>,
    event_rx: Receiver<notify::Result<Event>>,
    event_tx: Sender<notify::Result<Event>>,
    config: WatcherConfig,
    is_running: bool,
}

impl NativeWatcher {
    pub fn new(root: &Path, config: &WatcherConfig) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();

        Ok(Self {
            root: root.to_path_buf(),
            watcher: None,
            event_rx: rx,
            event_tx: tx,
            config: config.clone(),
            is_running: false,
        })
    }
}

#[async_trait]
impl PlatformWatcher for NativeWatcher {
    async fn start(&mut self) -> Result<()> {
        if self.is_running {
            return Ok(());
        }

        let tx = self.event_tx.clone();
        let notify_config = Config::default()
            .with_poll_interval(self.config.poll_interval)
            .with_compare_contents(false);

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            notify_config,
        )
        .context("Failed to create filesystem watcher")?;

        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", self.root.display()))?;

        self.watcher = Some(watcher);
        self.is_running = true;
        tracing::debug!("Watching {} recursively", self.root.display());
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.is_running {
            return Ok(());
        }

        if let Some(mut watcher) = self.watcher.take() {
            watcher
                .unwatch(&self.root)
                .with_context(|| format!("Failed to unwatch {}", self.root.display()))?;
        }

        self.is_running = false;
        Ok(())
    }

    async fn poll_events(&mut self) -> Result<Option<Vec<FsEvent>>> {
        match self.event_rx.try_recv() {
            Ok(Ok(event)) => Ok(Some(convert_event(&event))),
            Ok(Err(e)) => {
                // Lost or unreadable notifications; keep watching.
                tracing::warn!("Watcher error: {}", e);
                Ok(Some(Vec::new()))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => anyhow::bail!("Event channel disconnected"),
        }
    }

    fn is_running(&self) -> bool {
        self.is_running
    }
}

/// Translate one `notify` event into engine events.
///
/// Metadata-only changes and access notifications produce nothing. A rename
/// becomes a deletion of the old path and a creation of the new one.
pub fn convert_event(event: &Event) -> Vec<FsEvent> {
    let paths = &event.paths;

    match event.kind {
        EventKind::Create(CreateKind::Folder) => paths
            .iter()
            .map(|p| FsEvent::created(p).into_dir())
            .collect(),
        EventKind::Create(_) => paths.iter().map(|p| flag_dir(FsEvent::created(p))).collect(),

        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            paths.iter().map(|p| FsEvent::deleted(p)).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.iter().map(|p| flag_dir(FsEvent::created(p))).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match paths.as_slice() {
            [from, to, ..] => vec![FsEvent::deleted(from), flag_dir(FsEvent::created(to))],
            _ => Vec::new(),
        },
        // Rename without a side: decide by whether the path is still there
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .iter()
            .map(|p| {
                if p.exists() {
                    flag_dir(FsEvent::created(p))
                } else {
                    FsEvent::deleted(p)
                }
            })
            .collect(),
        EventKind::Modify(_) => paths.iter().map(|p| flag_dir(FsEvent::modified(p))).collect(),

        EventKind::Remove(RemoveKind::Folder) => paths
            .iter()
            .map(|p| FsEvent::deleted(p).into_dir())
            .collect(),
        EventKind::Remove(_) => paths.iter().map(|p| FsEvent::deleted(p)).collect(),

        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

fn flag_dir(event: FsEvent) -> FsEvent {
    if event.path().is_dir() {
        event.into_dir()
    } else {
        event
    }
}
