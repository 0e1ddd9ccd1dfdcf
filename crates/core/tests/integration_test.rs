//! Integration tests for the rewind content store

use rewind_core::{hash_bytes, hash_file, ErrorKind, SnapshotRef, SnapshotStore, Timestamp};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

fn ts(s: &str) -> Timestamp {
    Timestamp::parse(s).unwrap()
}

#[test]
fn test_full_storage_pipeline() -> anyhow::Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let work = temp_dir.path().join("work");
    std::fs::create_dir_all(&work)?;
    let store = SnapshotStore::open(&temp_dir.path().join("snapshots"))?;

    let file = work.join("report.txt");
    let at = ts("2024-05-01-09:30:00");

    std::fs::write(&file, b"first draft")?;
    let data = std::fs::read(&file)?;
    let first = store.put(&file, at, &data)?;

    // Hash of the stored bytes matches the hash of the live file they came from
    assert_eq!(hash_bytes(&store.get(&first)?), hash_file(&file)?);
    assert!(first.as_str().starts_with("report.txt_2024-05-01-09:30:00_"));
    assert!(first.as_str().ends_with(".snap"));

    // Same file, same second, same bytes: still a separate snapshot
    let second = store.put(&file, at, &data)?;
    assert_ne!(first, second);
    assert_eq!(store.get(&second)?, b"first draft");

    // Editing the live file never changes what was captured
    std::fs::write(&file, b"second draft")?;
    assert_eq!(store.get(&first)?, b"first draft");

    Ok(())
}

#[test]
fn test_store_persistence() -> anyhow::Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let root = temp_dir.path().join("snapshots");

    let snapshot_ref = {
        let store = SnapshotStore::open(&root)?;
        store.put(std::path::Path::new("/w/a.txt"), ts("2024-01-01"), b"kept")?
    };

    let reopened = SnapshotStore::open(&root)?;
    assert!(reopened.contains(&snapshot_ref));
    assert_eq!(reopened.get(&snapshot_ref)?, b"kept");

    // Refs are immutable once written
    let err = reopened.put_with_ref(&snapshot_ref, b"replaced").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageFailure);
    assert_eq!(reopened.get(&snapshot_ref)?, b"kept");

    Ok(())
}

#[test]
fn test_missing_and_malformed_refs() -> anyhow::Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let store = SnapshotStore::open(temp_dir.path())?;

    let err = store.get(&SnapshotRef::new("never_written.snap")).unwrap_err();
    assert!(err.is_not_found());

    for bad in ["../escape.snap", "nested/a.snap", ""] {
        let err = store.get(&SnapshotRef::new(bad)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument, "ref {:?}", bad);
    }

    Ok(())
}

#[test]
fn test_concurrent_puts_get_distinct_refs() -> anyhow::Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let store = Arc::new(SnapshotStore::open(temp_dir.path())?);
    let at = ts("2024-01-01-12:00:00");

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let payload = format!("payload {}", i).into_bytes();
                let snapshot_ref = store
                    .put(std::path::Path::new("/w/shared.txt"), at, &payload)
                    .unwrap();
                (snapshot_ref, payload)
            })
        })
        .collect();

    let mut refs = HashSet::new();
    for handle in handles {
        let (snapshot_ref, payload) = handle.join().unwrap();
        assert_eq!(store.get(&snapshot_ref)?, payload);
        refs.insert(snapshot_ref);
    }
    assert_eq!(refs.len(), 8);

    Ok(())
}
