//! Change capture: one filesystem event in, one (snapshot, history record) out
//!
//! Captures for the same path are serialized with an in-memory per-path lock.
//! Distinct paths proceed in parallel.

use crate::records::FileHistoryRecord;
use crate::store::MetadataStore;
use dashmap::DashMap;
use parking_lot::Mutex;
use rewind_core::{
    hash_bytes, FsEvent, IoContext, Result, RewindError, SnapshotRef, SnapshotStore, Timestamp,
};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Number of read attempts before a file that keeps changing is given up on.
const STABLE_READ_ATTEMPTS: usize = 3;

/// Source of capture timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Local wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Result of handling one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Content snapshotted and recorded
    Captured(FileHistoryRecord),
    /// Deletion recorded
    Tombstoned(FileHistoryRecord),
    /// Directory, non-regular file, vanished file, or deletion of an untracked path
    Ignored,
}

/// Counters for capture activity
#[derive(Debug, Default)]
pub struct CaptureStats {
    captured: AtomicU64,
    tombstoned: AtomicU64,
    ignored: AtomicU64,
    failed: AtomicU64,
}

impl CaptureStats {
    fn record(&self, outcome: &CaptureOutcome) {
        let counter = match outcome {
            CaptureOutcome::Captured(_) => &self.captured,
            CaptureOutcome::Tombstoned(_) => &self.tombstoned,
            CaptureOutcome::Ignored => &self.ignored,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CaptureStatsSnapshot {
        CaptureStatsSnapshot {
            captured: self.captured.load(Ordering::Relaxed),
            tombstoned: self.tombstoned.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CaptureStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStatsSnapshot {
    pub captured: u64,
    pub tombstoned: u64,
    pub ignored: u64,
    pub failed: u64,
}

/// Turns filesystem events into durable history.
///
/// Construction never touches storage; the caller initializes the stores
/// before the first event arrives.
pub struct ChangeCapture {
    metadata: Arc<MetadataStore>,
    snapshots: Arc<SnapshotStore>,
    branch: String,
    clock: Arc<dyn Clock>,
    path_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
    /// Newest timestamp handed out on `branch`; loaded from the store on first use
    high_water: Mutex<Option<Timestamp>>,
    stats: CaptureStats,
}

impl ChangeCapture {
    /// Capture onto `branch` using the system clock.
    pub fn new(
        metadata: Arc<MetadataStore>,
        snapshots: Arc<SnapshotStore>,
        branch: impl Into<String>,
    ) -> Result<Self> {
        Self::with_clock(metadata, snapshots, branch, Arc::new(SystemClock))
    }

    pub fn with_clock(
        metadata: Arc<MetadataStore>,
        snapshots: Arc<SnapshotStore>,
        branch: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let branch = branch.into();
        crate::records::validate_branch(&branch)?;

        Ok(Self {
            metadata,
            snapshots,
            branch,
            clock,
            path_locks: DashMap::new(),
            high_water: Mutex::new(None),
            stats: CaptureStats::default(),
        })
    }

    /// Branch that captures are recorded on
    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    /// Handle one event for the watch loop.
    ///
    /// Errors are logged and the event is dropped; returns `None` in that case.
    pub fn handle(&self, event: &FsEvent) -> Option<CaptureOutcome> {
        match self.capture(event) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                self.stats.record_failure();
                tracing::error!(
                    "Dropped {} event for {}: {}",
                    event.label(),
                    event.path().display(),
                    e
                );
                None
            }
        }
    }

    /// Capture one event, surfacing errors to the caller.
    pub fn capture(&self, event: &FsEvent) -> Result<CaptureOutcome> {
        if event.is_dir() {
            self.stats.record(&CaptureOutcome::Ignored);
            return Ok(CaptureOutcome::Ignored);
        }

        let path = event.path();
        let lock = self.lock_for(path);
        let outcome = {
            let _guard = lock.lock();
            match event {
                FsEvent::Created(_) | FsEvent::Modified(_) => self.capture_contents(path),
                FsEvent::Deleted(_) => self.capture_deletion(path),
            }
        };
        drop(lock);
        self.release_lock(path);

        let outcome = outcome?;
        self.stats.record(&outcome);
        Ok(outcome)
    }

    fn capture_contents(&self, path: &Path) -> Result<CaptureOutcome> {
        let metadata = match std::fs::symlink_metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                tracing::debug!("{} vanished before capture", path.display());
                return Ok(CaptureOutcome::Ignored);
            }
            Err(e) => {
                return Err(RewindError::io(format!("Failed to stat {}", path.display()), e))
            }
        };

        if !metadata.is_file() {
            tracing::debug!("Skipping non-regular file {}", path.display());
            return Ok(CaptureOutcome::Ignored);
        }

        let data = match read_stable(path) {
            Ok(data) => data,
            Err(e) if e.is_not_found() => {
                tracing::debug!("{} vanished during capture", path.display());
                return Ok(CaptureOutcome::Ignored);
            }
            Err(e) => return Err(e),
        };
        let hash = hash_bytes(&data);
        let timestamp = self.next_timestamp()?;

        // No record is written unless the snapshot landed.
        let snapshot_ref = self.snapshots.put(path, timestamp, &data)?;
        let record = self.metadata.record_change(
            path,
            timestamp,
            &hash.to_hex(),
            &snapshot_ref,
            &self.branch,
        )?;

        tracing::debug!(
            "Captured {} ({} bytes) as {}",
            path.display(),
            data.len(),
            snapshot_ref
        );
        Ok(CaptureOutcome::Captured(record))
    }

    fn capture_deletion(&self, path: &Path) -> Result<CaptureOutcome> {
        // Untracked paths (including directories reported without a flag)
        // and repeated deletions leave no trace.
        match self.metadata.latest(path, &self.branch)? {
            Some(record) if !record.is_tombstone() => {}
            _ => {
                tracing::debug!("Ignoring deletion of untracked {}", path.display());
                return Ok(CaptureOutcome::Ignored);
            }
        }

        let timestamp = self.next_timestamp()?;
        let record = self.metadata.record_change(
            path,
            timestamp,
            "",
            &SnapshotRef::empty(),
            &self.branch,
        )?;

        tracing::debug!("Recorded deletion of {}", path.display());
        Ok(CaptureOutcome::Tombstoned(record))
    }

    /// Capture time, never earlier than anything already recorded on the branch.
    ///
    /// A clock that steps backwards (DST fall-back, NTP correction) repeats
    /// the last timestamp instead of writing history out of order.
    fn next_timestamp(&self) -> Result<Timestamp> {
        let mut high_water = self.high_water.lock();
        let floor = match *high_water {
            Some(ts) => Some(ts),
            None => self.metadata.latest_timestamp(&self.branch)?,
        };

        let now = self.clock.now();
        let timestamp = match floor {
            Some(floor) if floor > now => {
                tracing::warn!("Clock went back from {} to {}; capturing at {}", floor, now, floor);
                floor
            }
            _ => now,
        };
        *high_water = Some(timestamp);
        Ok(timestamp)
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        self.path_locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the lock entry once no capture holds or waits on it.
    fn release_lock(&self, path: &Path) {
        self.path_locks
            .remove_if(path, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Read a file, re-reading while its mtime changes underneath us.
fn read_stable(path: &Path) -> Result<Vec<u8>> {
    for _ in 0..STABLE_READ_ATTEMPTS {
        let before = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .io_context(|| format!("Failed to stat {}", path.display()))?;
        let data =
            std::fs::read(path).io_context(|| format!("Failed to read {}", path.display()))?;
        let after = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .io_context(|| format!("Failed to stat {}", path.display()))?;

        if before == after {
            return Ok(data);
        }
    }

    Err(RewindError::Storage(format!(
        "{} kept changing while being read",
        path.display()
    )))
}
