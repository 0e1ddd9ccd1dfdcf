//! Metadata records

use rewind_core::{Result, RewindError, SnapshotRef, Timestamp};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name of the default branch.
pub const MAIN_BRANCH: &str = "main";

/// One observed change to one path on one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHistoryRecord {
    /// Logical file identity
    pub path: PathBuf,
    /// When the change was captured
    pub timestamp: Timestamp,
    /// Hex content digest; empty for a deletion
    pub content_hash: String,
    /// Stored bytes; empty for a deletion
    pub snapshot_ref: SnapshotRef,
    /// Owning timeline
    pub branch: String,
}

impl FileHistoryRecord {
    /// Whether this record marks the path as deleted.
    pub fn is_tombstone(&self) -> bool {
        self.content_hash.is_empty()
    }
}

/// One entry in a branch timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub timestamp: Timestamp,
    pub branch: String,
    pub description: String,
}

/// A live file as of some point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEntry {
    pub path: PathBuf,
    pub content_hash: String,
    pub snapshot_ref: SnapshotRef,
}

impl From<FileHistoryRecord> for StateEntry {
    fn from(record: FileHistoryRecord) -> Self {
        Self {
            path: record.path,
            content_hash: record.content_hash,
            snapshot_ref: record.snapshot_ref,
        }
    }
}

/// Check that a branch name can be stored and typed on a command line.
pub fn validate_branch(branch: &str) -> Result<()> {
    if branch.is_empty() {
        return Err(RewindError::invalid("Branch name must not be empty"));
    }
    if branch.starts_with('-') || branch.starts_with('/') {
        return Err(RewindError::invalid(format!(
            "Branch name '{}' must not start with '-' or '/'",
            branch
        )));
    }
    if branch.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(RewindError::invalid(format!(
            "Branch name '{}' must not contain whitespace or control characters",
            branch.escape_debug()
        )));
    }
    Ok(())
}
