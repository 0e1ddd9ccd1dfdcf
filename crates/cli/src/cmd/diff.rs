//! Show changes between two timestamps

use crate::util;
use anyhow::Result;
use journal::{diff_states, ChangeKind};
use std::path::Path;

pub async fn run(db: &Path, t1: &str, t2: &str, branch: Option<String>) -> Result<()> {
    let t1 = util::parse_timestamp(t1)?;
    let t2 = util::parse_timestamp(t2)?;
    let store = util::open_store(db)?;
    let branch = util::resolve_branch(&store, branch)?;

    let before = store.state_at(t1, &branch)?;
    let after = store.state_at(t2, &branch)?;
    let changes = diff_states(&before, &after);

    if changes.is_empty() {
        println!("No changes between {} and {}.", t1, t2);
        return Ok(());
    }

    for change in changes {
        let marker = match change.kind {
            ChangeKind::Added => '+',
            ChangeKind::Removed => '-',
            ChangeKind::Modified => '~',
        };
        println!("{} {} ({})", marker, change.path.display(), change.kind);
    }
    Ok(())
}
