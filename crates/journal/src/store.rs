//! Metadata store for file history and branch timelines using sled
//!
//! Layout (one sled database directory):
//! ```text
//! file_history:  <branch> 0x00 <path> 0x00 <timestamp>  -> FileHistoryRecord
//! timeline:      <branch> 0x00 <timestamp>              -> TimelineEvent
//! meta:          schema_version, active_branch
//! ```
//! Timestamps have a fixed-width text form, so within one (branch, path) run
//! history keys sort chronologically and the last key at or before T is the
//! path's state at T.

use crate::records::{validate_branch, FileHistoryRecord, StateEntry, TimelineEvent, MAIN_BRANCH};
use rewind_core::{Result, RewindError, SnapshotRef, Timestamp};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

const HISTORY_TREE: &str = "file_history";
const TIMELINE_TREE: &str = "timeline";
const META_TREE: &str = "meta";

const KEY_SCHEMA_VERSION: &[u8] = b"schema_version";
const KEY_ACTIVE_BRANCH: &[u8] = b"active_branch";

/// Current on-disk layout version
pub const SCHEMA_VERSION: u32 = 1;

const SEP: u8 = 0;

/// Durable record of file history and timeline events.
pub struct MetadataStore {
    path: PathBuf,
    db: Db,
    history: Tree,
    timeline: Tree,
    meta: Tree,
}

impl MetadataStore {
    /// Open or create a metadata store at the given path.
    ///
    /// A missing database is created and initialized.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RewindError::io(format!("Failed to create {}", parent.display()), e)
                })?;
            }
        }

        let db = sled::open(path).map_err(|e| open_error(path, e))?;
        let history = db.open_tree(HISTORY_TREE).db_context(|| "open file_history")?;
        let timeline = db.open_tree(TIMELINE_TREE).db_context(|| "open timeline")?;
        let meta = db.open_tree(META_TREE).db_context(|| "open meta")?;

        let store = Self {
            path: path.to_path_buf(),
            db,
            history,
            timeline,
            meta,
        };
        store.init()?;
        Ok(store)
    }

    /// Ensure the schema exists. Idempotent; never clears data.
    pub fn init(&self) -> Result<()> {
        match self.meta.get(KEY_SCHEMA_VERSION).db_context(|| "read schema version")? {
            None => {
                self.meta
                    .insert(KEY_SCHEMA_VERSION, SCHEMA_VERSION.to_le_bytes().to_vec())
                    .db_context(|| "write schema version")?;
                self.flush()?;
                tracing::info!("Initialized metadata store at {}", self.path.display());
            }
            Some(raw) => {
                let bytes: [u8; 4] = raw.as_ref().try_into().map_err(|_| {
                    RewindError::Corrupted("schema_version is not a u32".to_string())
                })?;
                let version = u32::from_le_bytes(bytes);
                if version != SCHEMA_VERSION {
                    return Err(RewindError::Storage(format!(
                        "Unsupported schema version {} at {} (expected {})",
                        version,
                        self.path.display(),
                        SCHEMA_VERSION
                    )));
                }
            }
        }
        Ok(())
    }

    /// Location of the database
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one change: upsert the history row for (path, timestamp, branch)
    /// and add a timeline event for (timestamp, branch) unless one exists.
    ///
    /// Both writes commit in a single transaction.
    pub fn record_change(
        &self,
        path: &Path,
        timestamp: Timestamp,
        content_hash: &str,
        snapshot_ref: &SnapshotRef,
        branch: &str,
    ) -> Result<FileHistoryRecord> {
        validate_branch(branch)?;
        let path_text = path_str(path)?;

        let record = FileHistoryRecord {
            path: path.to_path_buf(),
            timestamp,
            content_hash: content_hash.to_string(),
            snapshot_ref: snapshot_ref.clone(),
            branch: branch.to_string(),
        };
        let event = TimelineEvent {
            timestamp,
            branch: branch.to_string(),
            description: format!("Change to {}", path_text),
        };

        let history_key = history_key(branch, path_text, timestamp);
        let history_value = encode(&record)?;
        let timeline_key = timeline_key(branch, timestamp);
        let timeline_value = encode(&event)?;

        let result = (&self.history, &self.timeline).transaction(|(history, timeline)| {
            history.insert(history_key.as_slice(), history_value.as_slice())?;
            if timeline.get(timeline_key.as_slice())?.is_none() {
                timeline.insert(timeline_key.as_slice(), timeline_value.as_slice())?;
            }
            Ok::<(), ConflictableTransactionError<()>>(())
        });
        result.map_err(|e| transaction_error("record change", e))?;
        self.flush()?;

        tracing::debug!(
            "Recorded {} for {} at {} on {}",
            if record.is_tombstone() { "deletion" } else { "change" },
            path_text,
            timestamp,
            branch
        );
        Ok(record)
    }

    /// Timeline of a branch, newest first.
    pub fn list_timeline(&self, branch: &str) -> Result<Vec<TimelineEvent>> {
        let mut events = Vec::new();
        for item in self.timeline.scan_prefix(branch_prefix(branch)).rev() {
            let (_, value) = item.db_context(|| "scan timeline")?;
            events.push(decode::<TimelineEvent>(&value)?);
        }
        Ok(events)
    }

    /// Newest timeline timestamp on `branch`, if it has any events.
    pub fn latest_timestamp(&self, branch: &str) -> Result<Option<Timestamp>> {
        match self.timeline.scan_prefix(branch_prefix(branch)).next_back() {
            Some(item) => {
                let (_, value) = item.db_context(|| "scan timeline")?;
                Ok(Some(decode::<TimelineEvent>(&value)?.timestamp))
            }
            None => Ok(None),
        }
    }

    /// Live files on `branch` as of `timestamp`.
    ///
    /// Exactly one entry per path: the latest record at or before
    /// `timestamp`. Paths whose latest record is a deletion are omitted.
    /// Entries are sorted by path.
    pub fn state_at(&self, timestamp: Timestamp, branch: &str) -> Result<Vec<StateEntry>> {
        let mut latest: BTreeMap<PathBuf, FileHistoryRecord> = BTreeMap::new();

        for item in self.history.scan_prefix(branch_prefix(branch)) {
            let (_, value) = item.db_context(|| "scan file_history")?;
            let record = decode::<FileHistoryRecord>(&value)?;
            if record.timestamp <= timestamp {
                // Keys within a path run are in timestamp order, so the last
                // qualifying record wins.
                latest.insert(record.path.clone(), record);
            }
        }

        Ok(latest
            .into_values()
            .filter(|record| !record.is_tombstone())
            .map(StateEntry::from)
            .collect())
    }

    /// All branch names that have timeline events.
    pub fn list_branches(&self) -> Result<BTreeSet<String>> {
        let mut branches = BTreeSet::new();
        for item in self.timeline.iter().keys() {
            let key = item.db_context(|| "scan timeline")?;
            let branch = key
                .split(|&b| b == SEP)
                .next()
                .ok_or_else(|| RewindError::Corrupted("empty timeline key".to_string()))?;
            let branch = std::str::from_utf8(branch)
                .map_err(|_| RewindError::Corrupted("timeline key is not UTF-8".to_string()))?;
            branches.insert(branch.to_string());
        }
        Ok(branches)
    }

    /// Whether any timeline event exists for `branch`.
    pub fn branch_exists(&self, branch: &str) -> Result<bool> {
        match self.timeline.scan_prefix(branch_prefix(branch)).next() {
            Some(item) => {
                item.db_context(|| "scan timeline")?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Insert a branch lifecycle event. The first description written for a
    /// (timestamp, branch) key wins; returns whether this call inserted it.
    ///
    /// File history is not copied: a new branch starts empty.
    pub fn create_branch_event(
        &self,
        branch: &str,
        timestamp: Timestamp,
        description: &str,
    ) -> Result<bool> {
        validate_branch(branch)?;

        let event = TimelineEvent {
            timestamp,
            branch: branch.to_string(),
            description: description.to_string(),
        };
        let swapped = self
            .timeline
            .compare_and_swap(
                timeline_key(branch, timestamp),
                None as Option<&[u8]>,
                Some(encode(&event)?),
            )
            .db_context(|| "write branch event")?;
        self.flush()?;

        Ok(swapped.is_ok())
    }

    /// Create a new, empty branch.
    pub fn create_branch(&self, branch: &str, timestamp: Timestamp) -> Result<TimelineEvent> {
        validate_branch(branch)?;
        if self.branch_exists(branch)? {
            return Err(RewindError::invalid(format!(
                "Branch {} already exists",
                branch
            )));
        }

        let description = format!("Branch {} created", branch);
        self.create_branch_event(branch, timestamp, &description)?;
        tracing::info!("Created branch {} at {}", branch, timestamp);

        Ok(TimelineEvent {
            timestamp,
            branch: branch.to_string(),
            description,
        })
    }

    /// Every path ever recorded on `branch`.
    pub fn tracked_paths(&self, branch: &str) -> Result<BTreeSet<PathBuf>> {
        let prefix = branch_prefix(branch);
        let mut paths = BTreeSet::new();

        for item in self.history.scan_prefix(&prefix).keys() {
            let key = item.db_context(|| "scan file_history")?;
            let rest = &key[prefix.len()..];
            let end = rest
                .iter()
                .position(|&b| b == SEP)
                .ok_or_else(|| RewindError::Corrupted("history key has no path".to_string()))?;
            let path = std::str::from_utf8(&rest[..end])
                .map_err(|_| RewindError::Corrupted("history path is not UTF-8".to_string()))?;
            paths.insert(PathBuf::from(path));
        }
        Ok(paths)
    }

    /// History of one path on `branch`, oldest first.
    pub fn history(&self, path: &Path, branch: &str) -> Result<Vec<FileHistoryRecord>> {
        let prefix = path_prefix(branch, path_str(path)?);
        let mut records = Vec::new();
        for item in self.history.scan_prefix(prefix) {
            let (_, value) = item.db_context(|| "scan file_history")?;
            records.push(decode::<FileHistoryRecord>(&value)?);
        }
        Ok(records)
    }

    /// Most recent record for one path on `branch`, if any.
    pub fn latest(&self, path: &Path, branch: &str) -> Result<Option<FileHistoryRecord>> {
        let prefix = path_prefix(branch, path_str(path)?);
        match self.history.scan_prefix(prefix).next_back() {
            Some(item) => {
                let (_, value) = item.db_context(|| "scan file_history")?;
                Ok(Some(decode(&value)?))
            }
            None => Ok(None),
        }
    }

    /// Branch that new captures and default queries use.
    pub fn active_branch(&self) -> Result<String> {
        match self.meta.get(KEY_ACTIVE_BRANCH).db_context(|| "read active branch")? {
            Some(raw) => String::from_utf8(raw.to_vec())
                .map_err(|_| RewindError::Corrupted("active_branch is not UTF-8".to_string())),
            None => Ok(MAIN_BRANCH.to_string()),
        }
    }

    /// Switch the active branch. The branch must exist, except `main`.
    pub fn set_active_branch(&self, branch: &str) -> Result<()> {
        validate_branch(branch)?;
        if branch != MAIN_BRANCH && !self.branch_exists(branch)? {
            return Err(RewindError::invalid(format!(
                "Branch {} does not exist",
                branch
            )));
        }

        self.meta
            .insert(KEY_ACTIVE_BRANCH, branch.as_bytes())
            .db_context(|| "write active branch")?;
        self.flush()
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush().db_context(|| "flush")?;
        Ok(())
    }
}

/// Attach context to sled results.
trait DbContext<T> {
    fn db_context<F, S>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: std::fmt::Display;
}

impl<T> DbContext<T> for sled::Result<T> {
    fn db_context<F, S>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: std::fmt::Display,
    {
        self.map_err(|e| RewindError::Storage(format!("{}: {}", context(), e)))
    }
}

fn open_error(path: &Path, err: sled::Error) -> RewindError {
    let message = err.to_string();
    if message.contains("lock") {
        RewindError::Storage(format!(
            "Metadata store {} is in use by another process (is a watcher running?): {}",
            path.display(),
            message
        ))
    } else {
        RewindError::Storage(format!(
            "Failed to open metadata store {}: {}",
            path.display(),
            message
        ))
    }
}

fn transaction_error(context: &str, err: TransactionError<()>) -> RewindError {
    match err {
        TransactionError::Abort(()) => RewindError::Storage(format!("{}: aborted", context)),
        TransactionError::Storage(e) => RewindError::Storage(format!("{}: {}", context, e)),
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value)
        .map_err(|e| RewindError::Storage(format!("Failed to encode record: {}", e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes)
        .map_err(|e| RewindError::Corrupted(format!("Failed to decode record: {}", e)))
}

/// Paths are stored as UTF-8 text; NUL is the key separator.
fn path_str(path: &Path) -> Result<&str> {
    let text = path.to_str().ok_or_else(|| {
        RewindError::invalid(format!("Path is not valid UTF-8: {}", path.display()))
    })?;
    if text.is_empty() || text.contains('\0') {
        return Err(RewindError::invalid(format!(
            "Unsupported path: {:?}",
            text
        )));
    }
    Ok(text)
}

fn branch_prefix(branch: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(branch.len() + 1);
    key.extend_from_slice(branch.as_bytes());
    key.push(SEP);
    key
}

fn path_prefix(branch: &str, path: &str) -> Vec<u8> {
    let mut key = branch_prefix(branch);
    key.extend_from_slice(path.as_bytes());
    key.push(SEP);
    key
}

fn history_key(branch: &str, path: &str, timestamp: Timestamp) -> Vec<u8> {
    let mut key = path_prefix(branch, path);
    key.extend_from_slice(timestamp.to_string().as_bytes());
    key
}

fn timeline_key(branch: &str, timestamp: Timestamp) -> Vec<u8> {
    let mut key = branch_prefix(branch);
    key.extend_from_slice(timestamp.to_string().as_bytes());
    key
}
