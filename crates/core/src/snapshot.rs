//! Snapshot content store
//!
//! Every capture writes one immutable file into the snapshot directory:
//! ```text
//! <snapshot_dir>/
//!   a.txt_2024-01-01-00:00:00_01HN8XYZ....snap
//!   .tmp/
//! ```
//! Refs are keyed by capture event rather than content hash: two captures of
//! identical bytes are still two historical events and get two snapshots.

use crate::error::{IoContext, Result, RewindError};
use crate::fsutil::atomic_create;
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use ulid::Ulid;

const SNAPSHOT_EXTENSION: &str = "snap";
const TMP_DIR: &str = ".tmp";

/// Opaque reference to a stored snapshot (its file name in the store).
///
/// The empty ref marks a deletion record.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotRef(String);

impl SnapshotRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The ref carried by deletion records.
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Generate a fresh ref embedding the source file name and capture time.
    pub fn generate(source: &Path, timestamp: Timestamp) -> Self {
        let basename = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        Self(format!(
            "{}_{}_{}.{}",
            basename,
            timestamp,
            Ulid::new(),
            SNAPSHOT_EXTENSION
        ))
    }

    fn validate(&self) -> Result<()> {
        let name = self.0.as_str();
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
            || name.contains('\0')
        {
            return Err(RewindError::invalid(format!(
                "Invalid snapshot reference '{}'",
                name
            )));
        }
        Ok(())
    }
}

impl fmt::Display for SnapshotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SnapshotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotRef({:?})", self.0)
    }
}

/// Immutable snapshot storage on disk.
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    /// Open (creating if needed) a snapshot directory.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)
            .io_context(|| format!("Failed to create snapshot directory {}", root.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Snapshot directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store the captured bytes of `source` and return a fresh ref.
    pub fn put(&self, source: &Path, timestamp: Timestamp, data: &[u8]) -> Result<SnapshotRef> {
        let snapshot_ref = SnapshotRef::generate(source, timestamp);
        self.put_with_ref(&snapshot_ref, data)?;
        Ok(snapshot_ref)
    }

    /// Store bytes under an explicit ref. Fails if the ref is already taken.
    pub fn put_with_ref(&self, snapshot_ref: &SnapshotRef, data: &[u8]) -> Result<()> {
        let target = self.path_of(snapshot_ref)?;
        if target.exists() {
            return Err(RewindError::Storage(format!(
                "Snapshot {} already exists",
                snapshot_ref
            )));
        }

        atomic_create(&self.root.join(TMP_DIR), &target, data)?;
        tracing::debug!("Stored snapshot {} ({} bytes)", snapshot_ref, data.len());
        Ok(())
    }

    /// Read snapshot bytes back.
    pub fn get(&self, snapshot_ref: &SnapshotRef) -> Result<Vec<u8>> {
        let path = self.path_of(snapshot_ref)?;
        match fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RewindError::not_found(
                format!("snapshot {} in {}", snapshot_ref, self.root.display()),
            )),
            Err(e) => Err(RewindError::io(
                format!("Failed to read snapshot {}", path.display()),
                e,
            )),
        }
    }

    /// Whether a snapshot exists for `snapshot_ref`.
    pub fn contains(&self, snapshot_ref: &SnapshotRef) -> bool {
        self.path_of(snapshot_ref)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// On-disk location of a snapshot.
    pub fn path_of(&self, snapshot_ref: &SnapshotRef) -> Result<PathBuf> {
        snapshot_ref.validate()?;
        Ok(self.root.join(snapshot_ref.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn test_put_get_roundtrip() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(&temp_dir.path().join("snaps"))?;

        let r = store.put(Path::new("/work/a.txt"), ts("2024-01-01-00:00:00"), b"hello")?;

        assert!(store.contains(&r));
        assert_eq!(store.get(&r)?, b"hello");
        Ok(())
    }

    #[test]
    fn test_ref_embeds_name_and_timestamp() {
        let r = SnapshotRef::generate(Path::new("/work/src/main.rs"), ts("2024-01-01-12:00:00"));
        assert!(r.as_str().starts_with("main.rs_2024-01-01-12:00:00_"));
        assert!(r.as_str().ends_with(".snap"));
    }

    #[test]
    fn test_identical_captures_get_distinct_refs() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(temp_dir.path())?;
        let when = ts("2024-01-01-00:00:00");

        let r1 = store.put(Path::new("/w/a.txt"), when, b"same")?;
        let r2 = store.put(Path::new("/w/a.txt"), when, b"same")?;

        assert_ne!(r1, r2);
        assert_eq!(store.get(&r1)?, store.get(&r2)?);
        Ok(())
    }

    #[test]
    fn test_put_never_overwrites() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(temp_dir.path())?;
        let r = SnapshotRef::new("fixed.snap");

        store.put_with_ref(&r, b"original")?;
        assert!(store.put_with_ref(&r, b"replacement").is_err());
        assert_eq!(store.get(&r)?, b"original");
        Ok(())
    }

    #[test]
    fn test_get_missing_is_not_found() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(temp_dir.path())?;

        let err = store.get(&SnapshotRef::new("nope.snap")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        Ok(())
    }

    #[test]
    fn test_rejects_escaping_refs() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(temp_dir.path())?;

        for bad in ["", "..", "../etc/passwd", "a/b.snap"] {
            let err = store.get(&SnapshotRef::new(bad)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "ref: {:?}", bad);
        }
        Ok(())
    }

    #[test]
    fn test_empty_file_snapshot() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(temp_dir.path())?;

        let r = store.put(Path::new("/w/empty"), ts("2024-01-01-00:00:00"), b"")?;
        assert!(store.get(&r)?.is_empty());
        Ok(())
    }
}
