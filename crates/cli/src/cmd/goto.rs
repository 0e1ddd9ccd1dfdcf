//! Show the tracked files as of a timestamp

use crate::util;
use anyhow::Result;
use std::path::Path;

pub async fn run(db: &Path, timestamp: &str, branch: Option<String>) -> Result<()> {
    let timestamp = util::parse_timestamp(timestamp)?;
    let store = util::open_store(db)?;
    let branch = util::resolve_branch(&store, branch)?;

    let state = store.state_at(timestamp, &branch)?;
    if state.is_empty() {
        println!("No files tracked at {}.", timestamp);
        return Ok(());
    }

    for entry in state {
        println!(
            "{} (Snapshot: {}, Hash: {})",
            entry.path.display(),
            entry.snapshot_ref,
            entry.content_hash
        );
    }
    Ok(())
}
