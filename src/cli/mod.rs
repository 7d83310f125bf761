pub mod commands;

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

pub use commands::Commands;

/// nessync — keep a local copy of the Tenable plugin catalog
///
/// Downloads the plugin catalog page by page and merges newer plugins into
/// an existing JSON snapshot.
#[derive(Parser, Debug)]
#[command(
    name = "nessync",
    version,
    about = "🔄 nessync — Tenable plugin catalog sync",
    long_about = "nessync downloads the Tenable.io plugin catalog into a JSON file and keeps it current.\n\nRequired environment:\n  TENABLE_ACCESS_KEY  Tenable API access key\n  TENABLE_SECRET_KEY  Tenable API secret key\n\nQuery a snapshot with jq:\n  jq '.data.plugin_details[] | select(.name | contains(\"QUERY\"))' nessus-plugins.json"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Summary format
    #[arg(long, value_enum, default_value = "terminal", global = true)]
    pub format: OutputFormat,

    /// Read settings from this file instead of searching for .nessync.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Ignore .nessync.toml files
    #[arg(long, global = true, conflicts_with = "config")]
    pub no_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Terminal,
    Json,
}
