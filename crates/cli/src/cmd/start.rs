//! Start watching a directory in the foreground

use anyhow::Result;
use std::path::Path;

pub async fn run(dir: &Path, db: &Path, snapshot_dir: &Path) -> Result<()> {
    let config = crate::system_config::load();
    crate::daemon::run(dir, db, snapshot_dir, config).await
}
