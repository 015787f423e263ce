use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "shelfmix",
    version,
    about = "Compose Audiobookshelf podcast playlists from a YAML config and sync them to the server"
)]
pub struct Cli {
    /// Path to the YAML config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compose playlists and converge the server to them (the default)
    Sync {
        /// Compute and report every operation without touching the server
        #[arg(long)]
        dry_run: bool,
    },
    /// Load the config and print what would be composed
    Validate,
}
