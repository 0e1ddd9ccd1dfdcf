//! Crash-safe file helpers

use crate::error::{IoContext, Result, RewindError};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Write `data` to `target`, failing if `target` already exists.
///
/// The bytes go to a temporary file in `tmp_dir` first, are fsynced, and are
/// then hard-linked into place. Linking refuses to replace an existing file,
/// so a published target is never overwritten and never observed half-written.
/// `tmp_dir` must be on the same filesystem as `target`.
pub fn atomic_create(tmp_dir: &Path, target: &Path, data: &[u8]) -> Result<()> {
    fs::create_dir_all(tmp_dir)
        .io_context(|| format!("Failed to create {}", tmp_dir.display()))?;

    let temp_path = tmp_dir.join(uuid::Uuid::new_v4().to_string());

    let write_temp = || -> std::io::Result<()> {
        let mut temp_file = fs::File::create(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()
    };
    if let Err(e) = write_temp() {
        let _ = fs::remove_file(&temp_path);
        return Err(RewindError::io(
            format!("Failed to write {}", temp_path.display()),
            e,
        ));
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .io_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let linked = fs::hard_link(&temp_path, target);
    let _ = fs::remove_file(&temp_path);
    linked.io_context(|| format!("Failed to publish {}", target.display()))?;

    // Fsync parent directory for durability
    if let Some(parent) = target.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}

/// Turn an absolute path into a relative one by dropping the root and any
/// prefix, so it can be re-rooted under another directory.
///
/// `..` components are dropped as well; the result never escapes its new root.
pub fn strip_root(path: &Path) -> PathBuf {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}
