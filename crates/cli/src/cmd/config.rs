//! Show system configuration

use crate::system_config;
use anyhow::Result;

pub async fn run(list: bool, get: Option<String>) -> Result<()> {
    let config = system_config::load();

    if let Some(key) = get {
        return match config.get(&key) {
            Some(value) => {
                println!("{}", value);
                Ok(())
            }
            None => anyhow::bail!("Unknown config key: {}", key),
        };
    }

    if !list {
        if let Some(path) = system_config::config_file_path() {
            println!("# {}", path.display());
        }
    }
    print!("{}", config.to_toml()?);
    Ok(())
}
