//! Integration tests for the journal crate: capture through reconstruction

use journal::{
    CaptureOutcome, CapturePool, CapturePoolConfig, ChangeCapture, ChangeKind, Clock,
    MetadataStore, Reconstructor,
};
use rewind_core::{hash_bytes, hash_file, FsEvent, SnapshotRef, SnapshotStore, Timestamp};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Clock pinned by the test
struct ManualClock {
    base: Timestamp,
    offset: AtomicI64,
}

impl ManualClock {
    fn new(start: &str) -> Arc<Self> {
        Arc::new(Self {
            base: Timestamp::parse(start).unwrap(),
            offset: AtomicI64::new(0),
        })
    }

    fn set(&self, seconds: i64) {
        self.offset.store(seconds, Ordering::SeqCst);
    }

    fn at(&self, seconds: i64) -> Timestamp {
        Timestamp::from_datetime(self.base.as_datetime() + chrono::TimeDelta::seconds(seconds))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.at(self.offset.load(Ordering::SeqCst))
    }
}

struct Env {
    _temp: TempDir,
    work: PathBuf,
    metadata: Arc<MetadataStore>,
    snapshots: Arc<SnapshotStore>,
    clock: Arc<ManualClock>,
}

impl Env {
    fn new() -> anyhow::Result<Self> {
        let temp = TempDir::new()?;
        let work = temp.path().join("work");
        std::fs::create_dir_all(&work)?;

        let metadata = Arc::new(MetadataStore::open(&temp.path().join("meta.db"))?);
        let snapshots = Arc::new(SnapshotStore::open(&temp.path().join("snapshots"))?);

        Ok(Self {
            _temp: temp,
            work,
            metadata,
            snapshots,
            clock: ManualClock::new("2024-03-01-12:00:00"),
        })
    }

    fn capture(&self, branch: &str) -> anyhow::Result<ChangeCapture> {
        Ok(ChangeCapture::with_clock(
            Arc::clone(&self.metadata),
            Arc::clone(&self.snapshots),
            branch,
            self.clock.clone(),
        )?)
    }

    fn engine(&self) -> Reconstructor<'_> {
        Reconstructor::new(&self.metadata, &self.snapshots)
    }

    fn write(&self, name: &str, content: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.work.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }
}

fn paths_of(entries: &[journal::StateEntry]) -> Vec<&Path> {
    entries.iter().map(|e| e.path.as_path()).collect()
}

#[test]
fn test_capture_round_trip() -> anyhow::Result<()> {
    let env = Env::new()?;
    let capture = env.capture("main")?;
    let content = b"the quick brown fox";
    let file = env.write("notes.txt", content)?;

    let outcome = capture.capture(&FsEvent::modified(&file))?;
    assert!(matches!(outcome, CaptureOutcome::Captured(_)));

    let state = env.engine().state_at(env.clock.now(), "main")?;
    assert_eq!(paths_of(&state), vec![file.as_path()]);
    assert_eq!(state[0].content_hash, hash_bytes(content).to_hex());
    assert_eq!(env.snapshots.get(&state[0].snapshot_ref)?, content);
    Ok(())
}

#[test]
fn test_tombstone_exclusion() -> anyhow::Result<()> {
    let env = Env::new()?;
    let capture = env.capture("main")?;
    let file = env.write("doomed.txt", b"bye")?;

    capture.capture(&FsEvent::created(&file))?;
    env.clock.set(10);
    std::fs::remove_file(&file)?;
    capture.capture(&FsEvent::deleted(&file))?;

    assert_eq!(env.engine().state_at(env.clock.at(5), "main")?.len(), 1);
    assert!(env.engine().state_at(env.clock.at(10), "main")?.is_empty());
    assert!(env.engine().state_at(env.clock.at(3600), "main")?.is_empty());
    Ok(())
}

#[test]
fn test_latest_wins_reconstruction() -> anyhow::Result<()> {
    let env = Env::new()?;
    let capture = env.capture("main")?;

    let mut hashes = Vec::new();
    for (offset, content) in [(1, "v1"), (2, "v2"), (3, "v3")] {
        env.clock.set(offset);
        let file = env.write("p.txt", content.as_bytes())?;
        capture.capture(&FsEvent::modified(&file))?;
        hashes.push(hash_bytes(content.as_bytes()).to_hex());
    }

    let state = env.engine().state_at(env.clock.at(2), "main")?;
    assert_eq!(state.len(), 1);
    assert_eq!(state[0].content_hash, hashes[1]);
    Ok(())
}

#[test]
fn test_diff_symmetry() -> anyhow::Result<()> {
    let env = Env::new()?;
    let capture = env.capture("main")?;

    let a = env.write("a.txt", b"a")?;
    let b = env.write("b.txt", b"b")?;
    capture.capture(&FsEvent::created(&a))?;
    capture.capture(&FsEvent::created(&b))?;

    env.clock.set(10);
    let a = env.write("a.txt", b"a changed")?;
    capture.capture(&FsEvent::modified(&a))?;
    std::fs::remove_file(&b)?;
    capture.capture(&FsEvent::deleted(&b))?;
    let c = env.write("c.txt", b"c")?;
    capture.capture(&FsEvent::created(&c))?;

    let t1 = env.clock.at(0);
    let t2 = env.clock.at(10);
    let forward = env.engine().diff(t1, t2, "main")?;
    let backward = env.engine().diff(t2, t1, "main")?;

    let kinds = |diff: &[journal::DiffEntry]| {
        diff.iter()
            .map(|d| (d.path.clone(), d.kind))
            .collect::<Vec<_>>()
    };
    assert_eq!(
        kinds(&forward),
        vec![
            (a.clone(), ChangeKind::Modified),
            (b.clone(), ChangeKind::Removed),
            (c.clone(), ChangeKind::Added),
        ]
    );
    assert_eq!(
        kinds(&backward),
        vec![
            (a, ChangeKind::Modified),
            (b, ChangeKind::Added),
            (c, ChangeKind::Removed),
        ]
    );
    Ok(())
}

#[test]
fn test_restore_fidelity() -> anyhow::Result<()> {
    let env = Env::new()?;
    let capture = env.capture("main")?;

    let a = env.write("a.txt", b"first a")?;
    let b = env.write("deep/nested/b.txt", b"first b")?;
    capture.capture(&FsEvent::created(&a))?;
    capture.capture(&FsEvent::created(&b))?;

    env.clock.set(60);
    env.write("a.txt", b"second a")?;
    capture.capture(&FsEvent::modified(&a))?;
    let c = env.write("c.txt", b"added later")?;
    capture.capture(&FsEvent::created(&c))?;
    std::fs::remove_dir_all(env.work.join("deep"))?;
    capture.capture(&FsEvent::deleted(&b))?;

    let target = env.clock.at(30);
    let report = env.engine().restore(target, "main")?;

    assert!(report.is_success(), "failures: {:?}", report.failed);
    assert_eq!(report.restored, vec![a.clone(), b.clone()]);
    assert_eq!(report.removed, vec![c.clone()]);
    assert!(!c.exists());

    for entry in env.engine().state_at(target, "main")? {
        assert_eq!(hash_file(&entry.path)?.to_hex(), entry.content_hash);
    }

    // Overwritten and removed files were kept aside
    let backup = report.backup_dir.expect("backup directory");
    assert!(backup.is_dir());
    Ok(())
}

#[test]
fn test_idempotent_init() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let db = temp.path().join("meta.db");

    {
        let store = MetadataStore::open(&db)?;
        store.record_change(
            Path::new("/w/a"),
            Timestamp::parse("2024-01-01-00:00:00")?,
            "h",
            &SnapshotRef::new("a.snap"),
            "main",
        )?;
        store.init()?;
        store.init()?;
    }

    let store = MetadataStore::open(&db)?;
    store.init()?;
    assert_eq!(store.list_timeline("main")?.len(), 1);
    assert_eq!(store.history(Path::new("/w/a"), "main")?.len(), 1);
    Ok(())
}

#[test]
fn test_branches_log_independently_at_same_timestamp() -> anyhow::Result<()> {
    let env = Env::new()?;
    let main = env.capture("main")?;
    let t = env.clock.now();
    env.metadata.create_branch("experiment", t)?;
    let experiment = env.capture("experiment")?;

    let file = env.write("shared.txt", b"same moment")?;
    main.capture(&FsEvent::modified(&file))?;
    experiment.capture(&FsEvent::modified(&file))?;

    let main_timeline = env.metadata.list_timeline("main")?;
    let exp_timeline = env.metadata.list_timeline("experiment")?;
    assert_eq!(main_timeline.len(), 1);
    assert_eq!(exp_timeline.len(), 1);
    assert_eq!(main_timeline[0].timestamp, exp_timeline[0].timestamp);
    // The branch creation event came first on experiment
    assert_eq!(exp_timeline[0].description, "Branch experiment created");

    assert_eq!(env.engine().state_at(t, "main")?.len(), 1);
    assert_eq!(env.engine().state_at(t, "experiment")?.len(), 1);
    Ok(())
}

#[test]
fn test_timeline_scenario() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let store = MetadataStore::open(&temp.path().join("meta.db"))?;
    let t = Timestamp::parse("2024-01-01-00:00:00")?;

    store.record_change(
        Path::new("/tmp/a.txt"),
        t,
        "abc",
        &SnapshotRef::new("a.txt_2024-01-01-00:00:00.snap"),
        "main",
    )?;

    let timeline: Vec<(String, String)> = store
        .list_timeline("main")?
        .into_iter()
        .map(|e| (e.timestamp.to_string(), e.description))
        .collect();
    assert_eq!(
        timeline,
        vec![(
            "2024-01-01-00:00:00".to_string(),
            "Change to /tmp/a.txt".to_string()
        )]
    );

    let state = store.state_at(t, "main")?;
    assert_eq!(state.len(), 1);
    assert_eq!(state[0].content_hash, "abc");
    Ok(())
}

#[tokio::test]
async fn test_pool_drains_before_shutdown() -> anyhow::Result<()> {
    let env = Env::new()?;
    let capture = Arc::new(env.capture("main")?);
    let pool = CapturePool::start(
        Arc::clone(&capture),
        CapturePoolConfig {
            workers: 2,
            queue_depth: 1,
        },
    );

    let mut files = Vec::new();
    for i in 0..20 {
        let file = env.write(&format!("batch/{}.txt", i), format!("{}", i).as_bytes())?;
        pool.dispatch(FsEvent::created(&file)).await;
        files.push(file);
    }
    pool.shutdown().await;

    let state = env.engine().state_at(env.clock.now(), "main")?;
    assert_eq!(state.len(), files.len());
    for entry in &state {
        assert!(env.snapshots.contains(&entry.snapshot_ref));
    }
    Ok(())
}
