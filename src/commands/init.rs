//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use std::path::PathBuf;
use tracing::info;

/// Write a default config file; returns its path
pub fn cmd_init(config_path: Option<PathBuf>, force: bool) -> Result<PathBuf> {
    let config_path = config_path.unwrap_or_else(Config::default_config_path);

    if config_path.exists() && !force {
        return Err(Error::AlreadyInitialized(config_path.display().to_string()));
    }

    let base_dir = config_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_base_dir);
    let mut config = Config::with_base_dir(base_dir);
    config.paths.config_file = config_path.clone();

    config.validate()?;
    config.save()?;
    info!("Created config at {:?}", config_path);

    Ok(config_path)
}
