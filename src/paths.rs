use std::path::PathBuf;

use anyhow::{Context, Result};

pub fn database_file_path() -> Result<PathBuf> {
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join("anishift").join("anishift.db"))
}

pub fn default_config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("anishift").join("config.toml"))
}
