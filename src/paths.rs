use std::path::PathBuf;

use anyhow::{Context, Result};

pub fn config_file_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("unable to resolve config directory")?;
    Ok(base.join("shelfmix").join("config.yaml"))
}
