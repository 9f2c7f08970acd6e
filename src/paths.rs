use std::path::PathBuf;

use anyhow::{Context, Result};

fn data_root() -> Result<PathBuf> {
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join("skipintro"))
}

pub(crate) fn database_file_path() -> Result<PathBuf> {
    Ok(data_root()?.join("ranges.db"))
}

pub(crate) fn drafts_file_path() -> Result<PathBuf> {
    Ok(data_root()?.join("drafts.json"))
}

pub(crate) fn watch_log_path() -> Result<PathBuf> {
    Ok(data_root()?.join("watch.log"))
}
