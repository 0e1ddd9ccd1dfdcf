//! Filesystem change notifications
//!
//! The watcher produces these; change capture consumes them with a single
//! `match` over the variant.

use std::path::{Path, PathBuf};

/// Path carried by a filesystem event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventPath {
    pub path: PathBuf,
    pub is_dir: bool,
}

/// A raw filesystem change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FsEvent {
    Created(EventPath),
    Modified(EventPath),
    Deleted(EventPath),
}

impl FsEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::Created(EventPath::file(path))
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::Modified(EventPath::file(path))
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self::Deleted(EventPath::file(path))
    }

    /// Mark the event as concerning a directory.
    pub fn into_dir(self) -> Self {
        match self {
            Self::Created(p) => Self::Created(EventPath { is_dir: true, ..p }),
            Self::Modified(p) => Self::Modified(EventPath { is_dir: true, ..p }),
            Self::Deleted(p) => Self::Deleted(EventPath { is_dir: true, ..p }),
        }
    }

    fn target(&self) -> &EventPath {
        match self {
            Self::Created(p) | Self::Modified(p) | Self::Deleted(p) => p,
        }
    }

    pub fn path(&self) -> &Path {
        &self.target().path
    }

    pub fn is_dir(&self) -> bool {
        self.target().is_dir
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Modified(_) => "modified",
            Self::Deleted(_) => "deleted",
        }
    }
}

impl EventPath {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
        }
    }
}
