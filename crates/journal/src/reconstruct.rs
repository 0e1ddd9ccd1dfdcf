//! Point-in-time reconstruction: state at T, diff between times, restore to T
//!
//! Everything here is derived from metadata queries plus snapshot reads. The
//! engine keeps no state of its own.

use crate::records::StateEntry;
use crate::store::MetadataStore;
use rewind_core::fsutil::strip_root;
use rewind_core::{hash_file, IoContext, Result, RewindError, SnapshotStore, Timestamp};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

/// How a path differs between two points in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChangeKind::Added => "Added",
            ChangeKind::Removed => "Deleted",
            ChangeKind::Modified => "Modified",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Classify every path in the union of two states. Sorted by path;
/// unchanged paths are omitted.
pub fn diff_states(before: &[StateEntry], after: &[StateEntry]) -> Vec<DiffEntry> {
    let before: BTreeMap<&Path, &str> = before
        .iter()
        .map(|e| (e.path.as_path(), e.content_hash.as_str()))
        .collect();
    let after: BTreeMap<&Path, &str> = after
        .iter()
        .map(|e| (e.path.as_path(), e.content_hash.as_str()))
        .collect();

    let paths: BTreeSet<&Path> = before.keys().chain(after.keys()).copied().collect();

    paths
        .into_iter()
        .filter_map(|path| {
            let kind = match (before.get(path), after.get(path)) {
                (None, Some(_)) => ChangeKind::Added,
                (Some(_), None) => ChangeKind::Removed,
                (Some(old), Some(new)) if old != new => ChangeKind::Modified,
                _ => return None,
            };
            Some(DiffEntry {
                path: path.to_path_buf(),
                kind,
            })
        })
        .collect()
}

/// Outcome of a restore, per path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Paths rewritten from a snapshot
    pub restored: Vec<PathBuf>,
    /// Live files removed because they did not exist at the target time
    pub removed: Vec<PathBuf>,
    /// Paths whose live content already matched
    pub unchanged: Vec<PathBuf>,
    /// Paths left as they were, with the reason
    pub failed: Vec<(PathBuf, String)>,
    /// Where overwritten and removed files were copied first, if anywhere
    pub backup_dir: Option<PathBuf>,
}

impl RestoreReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Read and restore operations over one metadata store and snapshot store.
pub struct Reconstructor<'a> {
    metadata: &'a MetadataStore,
    snapshots: &'a SnapshotStore,
}

impl<'a> Reconstructor<'a> {
    pub fn new(metadata: &'a MetadataStore, snapshots: &'a SnapshotStore) -> Self {
        Self {
            metadata,
            snapshots,
        }
    }

    /// Live files on `branch` as of `timestamp`, one entry per path.
    pub fn state_at(&self, timestamp: Timestamp, branch: &str) -> Result<Vec<StateEntry>> {
        self.metadata.state_at(timestamp, branch)
    }

    /// Changes going from `t1` to `t2`.
    pub fn diff(&self, t1: Timestamp, t2: Timestamp, branch: &str) -> Result<Vec<DiffEntry>> {
        let before = self.metadata.state_at(t1, branch)?;
        let after = self.metadata.state_at(t2, branch)?;
        Ok(diff_states(&before, &after))
    }

    /// Make the live filesystem match `branch` as of `timestamp`.
    ///
    /// Files present at `timestamp` are written from their snapshots. Files
    /// the branch has tracked but which did not exist at `timestamp` are
    /// removed. Untracked files are never touched. Every live file that is
    /// overwritten or removed is first copied into a backup directory under
    /// the snapshot store. Failures are collected per path; there is no
    /// rollback.
    pub fn restore(&self, timestamp: Timestamp, branch: &str) -> Result<RestoreReport> {
        let target = self.metadata.state_at(timestamp, branch)?;
        let tracked = self.metadata.tracked_paths(branch)?;

        let mut report = RestoreReport::default();
        let mut backup = Backup::new(self.snapshots.root());

        for entry in &target {
            match self.restore_entry(entry, &mut backup) {
                Ok(true) => report.restored.push(entry.path.clone()),
                Ok(false) => report.unchanged.push(entry.path.clone()),
                Err(e) => {
                    tracing::error!("Failed to restore {}: {}", entry.path.display(), e);
                    report.failed.push((entry.path.clone(), e.to_string()));
                }
            }
        }

        let keep: BTreeSet<&Path> = target.iter().map(|e| e.path.as_path()).collect();
        for path in tracked.iter().filter(|p| !keep.contains(p.as_path())) {
            match remove_live(path, &mut backup) {
                Ok(true) => report.removed.push(path.clone()),
                Ok(false) => {}
                Err(e) => {
                    tracing::error!("Failed to remove {}: {}", path.display(), e);
                    report.failed.push((path.clone(), e.to_string()));
                }
            }
        }

        report.backup_dir = backup.dir;
        tracing::info!(
            "Restore to {} on {}: {} restored, {} removed, {} unchanged, {} failed",
            timestamp,
            branch,
            report.restored.len(),
            report.removed.len(),
            report.unchanged.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Returns false when the live file already has the target content.
    fn restore_entry(&self, entry: &StateEntry, backup: &mut Backup) -> Result<bool> {
        let path = entry.path.as_path();
        let live_exists = is_live_file(path)?;
        if live_exists && hash_file(path)?.to_hex() == entry.content_hash {
            return Ok(false);
        }

        let data = self.snapshots.get(&entry.snapshot_ref)?;

        if live_exists {
            backup.save(path)?;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .io_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, &data).io_context(|| format!("Failed to write {}", path.display()))?;

        tracing::debug!("Restored {} from {}", path.display(), entry.snapshot_ref);
        Ok(true)
    }
}

/// Returns false when there was nothing to remove.
fn remove_live(path: &Path, backup: &mut Backup) -> Result<bool> {
    if !is_live_file(path)? {
        return Ok(false);
    }
    backup.save(path)?;
    fs::remove_file(path).io_context(|| format!("Failed to remove {}", path.display()))?;
    tracing::debug!("Removed {}", path.display());
    Ok(true)
}

/// Whether a regular file exists at `path`. Anything else in the way is an error.
fn is_live_file(path: &Path) -> Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(m) if m.is_file() => Ok(true),
        Ok(_) => Err(RewindError::invalid(format!(
            "{} exists and is not a regular file",
            path.display()
        ))),
        Err(e) if e.kind() == IoErrorKind::NotFound => Ok(false),
        Err(e) => Err(RewindError::io(
            format!("Failed to stat {}", path.display()),
            e,
        )),
    }
}

/// Lazily created backup directory for one restore run
struct Backup {
    base: PathBuf,
    stamp: String,
    dir: Option<PathBuf>,
}

impl Backup {
    fn new(base: &Path) -> Self {
        Self {
            base: base.to_path_buf(),
            stamp: Timestamp::now().compact(),
            dir: None,
        }
    }

    fn dir(&mut self) -> Result<PathBuf> {
        if let Some(dir) = &self.dir {
            return Ok(dir.clone());
        }

        let mut candidate = self.base.join(format!("backup_{}", self.stamp));
        let mut n = 1;
        while candidate.exists() {
            candidate = self.base.join(format!("backup_{}-{}", self.stamp, n));
            n += 1;
        }
        fs::create_dir_all(&candidate)
            .io_context(|| format!("Failed to create {}", candidate.display()))?;
        tracing::info!("Backing up replaced files to {}", candidate.display());
        self.dir = Some(candidate.clone());
        Ok(candidate)
    }

    fn save(&mut self, live: &Path) -> Result<()> {
        let dest = self.dir()?.join(strip_root(live));
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .io_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::copy(live, &dest).io_context(|| {
            format!("Failed to back up {} to {}", live.display(), dest.display())
        })?;
        Ok(())
    }
}
