use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "skipintro",
    version,
    about = "Shared intro skip ranges: range service, client and terminal player"
)]
pub struct Cli {
    /// Base URL of the range service
    #[arg(long, global = true, value_name = "URL")]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the range service
    Serve {
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
        #[arg(long, value_name = "PATH")]
        db: Option<PathBuf>,
    },
    /// Print the stored range for an episode
    Fetch {
        episode_id: String,
        #[arg(long)]
        file_id: Option<String>,
        #[arg(long)]
        title: Option<String>,
    },
    /// Create or replace the range for an episode
    Save(SaveArgs),
    Delete {
        episode_id: String,
    },
    Exists {
        episode_id: String,
    },
    /// Download every stored range as JSON
    Export {
        #[arg(long, short, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    Ping,
    /// Play a simulated episode with automatic intro skipping
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
pub struct SaveArgs {
    pub episode_id: String,
    /// Start of the range, mm:ss or seconds
    #[arg(long)]
    pub start: String,
    /// End of the range, mm:ss or seconds
    #[arg(long)]
    pub end: String,
    #[arg(long)]
    pub file_id: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    pub offset: Option<f64>,
    #[arg(long)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct WatchArgs {
    #[arg(long)]
    pub content_id: String,
    #[arg(long)]
    pub episode: Option<u32>,
    #[arg(long)]
    pub season: Option<u32>,
    #[arg(long)]
    pub name: Option<String>,
    /// Identifies the source file; different URLs keep separate offsets
    #[arg(long)]
    pub stream_url: Option<String>,
    /// Length of the simulated video in seconds
    #[arg(long, default_value_t = 1440.0)]
    pub duration: f64,
}
