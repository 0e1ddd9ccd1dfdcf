//! Branch management commands
//!
//! Create, switch and list timeline branches.

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use rewind_core::Timestamp;
use std::path::Path;

/// Create a branch with a "Branch <name> created" timeline event
pub async fn create(db: &Path, name: &str) -> Result<()> {
    let store = util::open_store(db)?;
    let event = store.create_branch(name, Timestamp::now())?;
    store.flush()?;

    println!("{} Created branch {} at {}", "✓".green(), name.bold(), event.timestamp);
    Ok(())
}

/// Make `name` the branch that `start` captures onto and queries default to
pub async fn switch(db: &Path, name: &str) -> Result<()> {
    let store = util::open_store(db)?;
    store.set_active_branch(name)?;
    store.flush()?;

    println!("{} Switched to branch {}", "✓".green(), name.bold());
    Ok(())
}

/// List branches, marking the active one
pub async fn list(db: &Path) -> Result<()> {
    let store = util::open_store(db)?;
    let active = store.active_branch()?;
    let mut branches = store.list_branches()?;
    branches.insert(active.clone());

    for branch in branches {
        if branch == active {
            println!("* {}", branch.green());
        } else {
            println!("  {}", branch);
        }
    }
    Ok(())
}
