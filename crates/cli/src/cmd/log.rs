//! Show the recorded history of one file

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use std::path::Path;

pub async fn run(db: &Path, path: &Path, branch: Option<String>) -> Result<()> {
    let path = util::absolute_path(path)?;
    let store = util::open_store(db)?;
    let branch = util::resolve_branch(&store, branch)?;

    let history = store.history(&path, &branch)?;
    if history.is_empty() {
        println!("No history for {} on branch {}.", path.display(), branch);
        return Ok(());
    }

    println!("{} ({} changes on {})", path.display().bold(), history.len(), branch);
    // Newest first, like the timeline
    for record in history.iter().rev() {
        let change = if record.is_tombstone() {
            "deleted".red().to_string()
        } else {
            format!("{} {}", util::short_hash(&record.content_hash), record.snapshot_ref)
        };
        println!(
            "  {}  {}  {}",
            record.timestamp,
            change,
            util::format_relative_time(record.timestamp).dimmed()
        );
    }
    Ok(())
}
