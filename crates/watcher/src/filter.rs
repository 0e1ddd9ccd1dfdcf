//! Path filtering for watcher events

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Decides which paths never reach capture.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Path components that hide everything beneath them (e.g. `.git`)
    ignore: Vec<OsString>,
    /// Subtrees owned by the engine itself (metadata store, snapshots)
    exclude: Vec<PathBuf>,
}

impl EventFilter {
    pub fn new<I, S>(ignore: I, exclude: Vec<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            ignore: ignore.into_iter().map(Into::into).collect(),
            exclude,
        }
    }

    pub fn is_filtered(&self, path: &Path) -> bool {
        if self.exclude.iter().any(|prefix| path.starts_with(prefix)) {
            return true;
        }

        path.components().any(|component| match component {
            Component::Normal(name) => self.ignore.iter().any(|ignored| ignored == name),
            _ => false,
        })
    }
}
