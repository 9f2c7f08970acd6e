mod app;
mod cli;
mod client;
mod config;
mod db;
mod editor;
mod http;
mod model;
mod paths;
mod playback;
mod server;
mod timecode;
mod version;

#[cfg(test)]
mod testing;

use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Command;
use crate::paths::watch_log_path;

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = cli::Cli::parse();
    init_logging(matches!(cli.command, Command::Watch(_)))?;
    app::run(cli)
}

/// Logs go to stderr, except while the terminal player owns the screen.
fn init_logging(to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if !to_file {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    }

    let path = watch_log_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}
