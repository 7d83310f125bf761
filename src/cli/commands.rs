use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Subcommand;

use crate::catalog::FILTER_DATE_FORMAT;
use crate::config::MAX_PAGE_SIZE;
use crate::source::tenable::{ACCESS_KEY_ENV, SECRET_KEY_ENV};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download the plugin catalog into a new snapshot file
    Fetch(FetchArgs),

    /// Add plugins modified since the newest one in an existing snapshot
    Update(UpdateArgs),

    /// Print the details of a single plugin
    Plugin(PluginArgs),

    /// Save the list of scans to a JSON file
    Scans(ScansArgs),

    /// Print the details of a single scan
    Scan(ScanArgs),

    /// Initialize a .nessync.toml config file in the current directory
    Init,
}

/// Tenable API keys
#[derive(clap::Args, Debug, Clone)]
pub struct ApiKeyArgs {
    /// Tenable API access key
    #[arg(long, env = ACCESS_KEY_ENV, hide_env_values = true, default_value = "")]
    pub access_key: String,

    /// Tenable API secret key
    #[arg(long, env = SECRET_KEY_ENV, hide_env_values = true, default_value = "")]
    pub secret_key: String,
}

#[derive(clap::Args, Debug)]
pub struct FetchArgs {
    /// Only fetch plugins modified since this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub since: Option<NaiveDate>,

    /// Snapshot file to write (default from config: nessus-plugins.json)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Plugins per page request
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=MAX_PAGE_SIZE as i64))]
    pub page_size: Option<u32>,

    #[command(flatten)]
    pub keys: ApiKeyArgs,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    /// Previously generated snapshot file to update in place
    pub file: PathBuf,

    /// Plugins per page request
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=MAX_PAGE_SIZE as i64))]
    pub page_size: Option<u32>,

    #[command(flatten)]
    pub keys: ApiKeyArgs,
}

#[derive(clap::Args, Debug)]
pub struct PluginArgs {
    /// Plugin ID
    #[arg(value_parser = clap::value_parser!(i64).range(1..))]
    pub id: i64,

    #[command(flatten)]
    pub keys: ApiKeyArgs,
}

#[derive(clap::Args, Debug)]
pub struct ScansArgs {
    /// Only list scans modified since this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub since: Option<NaiveDate>,

    /// File to write the scan list to (default from config: scans.json)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    #[command(flatten)]
    pub keys: ApiKeyArgs,
}

#[derive(clap::Args, Debug)]
pub struct ScanArgs {
    /// Scan ID
    #[arg(value_parser = clap::value_parser!(i64).range(1..))]
    pub id: i64,

    #[command(flatten)]
    pub keys: ApiKeyArgs,
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, FILTER_DATE_FORMAT)
        .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}
