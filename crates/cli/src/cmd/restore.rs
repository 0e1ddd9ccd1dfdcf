//! Restore live files to their state at a timestamp

use crate::util;
use anyhow::{Context, Result};
use journal::Reconstructor;
use owo_colors::OwoColorize;
use rewind_core::SnapshotStore;
use std::path::Path;

pub async fn run(
    db: &Path,
    timestamp: &str,
    snapshot_dir: &Path,
    branch: Option<String>,
) -> Result<()> {
    let timestamp = util::parse_timestamp(timestamp)?;
    let store = util::open_store(db)?;
    let branch = util::resolve_branch(&store, branch)?;
    let snapshots = SnapshotStore::open(snapshot_dir)
        .with_context(|| format!("Failed to open snapshot directory {}", snapshot_dir.display()))?;

    let report = Reconstructor::new(&store, &snapshots).restore(timestamp, &branch)?;

    if report.restored.is_empty() && report.removed.is_empty() && report.failed.is_empty() {
        if report.unchanged.is_empty() {
            println!("No files tracked at {}.", timestamp);
        } else {
            println!("All {} files already match {}.", report.unchanged.len(), timestamp);
        }
        return Ok(());
    }

    for path in &report.restored {
        println!("{} Restored {}", "✓".green(), path.display());
    }
    for path in &report.removed {
        println!("{} Removed {}", "✓".green(), path.display());
    }
    for (path, reason) in &report.failed {
        eprintln!("{} Failed {}: {}", "✗".red(), path.display(), reason);
    }

    println!();
    println!(
        "Restored to {}: {} restored, {} removed, {} unchanged",
        timestamp,
        report.restored.len(),
        report.removed.len(),
        report.unchanged.len()
    );
    if let Some(backup_dir) = &report.backup_dir {
        println!("  Previous versions saved in {}", backup_dir.display().dimmed());
    }

    if !report.is_success() {
        anyhow::bail!("{} paths could not be restored", report.failed.len());
    }
    Ok(())
}
