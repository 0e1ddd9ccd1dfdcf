//! Create (or verify) a metadata store

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use std::path::Path;

pub async fn run(db: &Path) -> Result<()> {
    let store = util::open_store(db)?;
    // Idempotent: an existing store keeps every record
    store.init()?;
    store.flush()?;

    println!(
        "{} Initialized metadata store at {}",
        "✓".green(),
        store.path().display()
    );
    println!("  Active branch: {}", store.active_branch()?);
    Ok(())
}
