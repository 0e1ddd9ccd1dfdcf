//! Show a branch's timeline

use crate::util;
use anyhow::Result;
use std::path::Path;

pub async fn run(db: &Path, branch: Option<String>) -> Result<()> {
    let store = util::open_store(db)?;
    let branch = util::resolve_branch(&store, branch)?;

    let events = store.list_timeline(&branch)?;
    if events.is_empty() {
        println!("No timeline entries found.");
        return Ok(());
    }

    for event in events {
        println!("{}: {}", event.timestamp, event.description);
    }
    Ok(())
}
