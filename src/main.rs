mod catalog;
mod cli;
mod config;
mod engine;
mod error;
mod report;
mod source;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, OutputFormat};
use config::NessyncConfig;
use engine::{SyncEngine, SyncReport};
use source::tenable::{Credentials, TenableClient};
use source::Pagination;
use store::JsonFileStore;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose {
        "nessync=debug"
    } else if cli.quiet {
        "nessync=error"
    } else {
        "nessync=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    info!("nessync v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Fetch(args) => {
            let client = client(&config, &args.keys)?;
            let out = args.out.clone().unwrap_or_else(|| config.output.file.clone());
            let store = JsonFileStore::new(&out).pretty(config.output.pretty);
            let page_size = args.page_size.unwrap_or(config.api.page_size);

            let mut engine = SyncEngine::new(&client, &store, Pagination::from_config(&config.api), page_size);
            let report = engine
                .fetch(args.since)
                .with_context(|| format!("Failed to fetch plugins into {}", out.display()))?;
            print_report(&report, cli.format)?;
        }
        Commands::Update(args) => {
            let client = client(&config, &args.keys)?;
            let store = JsonFileStore::new(&args.file).pretty(config.output.pretty);
            info!("Updating file {}", store.path().display());
            let page_size = args.page_size.unwrap_or(config.api.page_size);

            let mut engine = SyncEngine::new(&client, &store, Pagination::from_config(&config.api), page_size);
            let report = engine
                .update()
                .with_context(|| format!("Failed to update {}", args.file.display()))?;
            print_report(&report, cli.format)?;
        }
        Commands::Plugin(args) => {
            let client = client(&config, &args.keys)?;
            let details = client
                .fetch_plugin(args.id)
                .with_context(|| format!("Failed to fetch plugin id {}", args.id))?;
            println!("{}", serde_json::to_string_pretty(&details)?);
        }
        Commands::Scans(args) => {
            let client = client(&config, &args.keys)?;
            let out = args.out.clone().unwrap_or_else(|| config.output.scans_file.clone());
            let scans = client.list_scans(args.since).context("Failed to list scans")?;
            write_json(&out, &scans, config.output.pretty)?;
            let count = scans["scans"].as_array().map_or(0, Vec::len);
            info!("Saved {} scans to {}", count, out.display());
        }
        Commands::Scan(args) => {
            let client = client(&config, &args.keys)?;
            let details = client
                .fetch_scan(args.id)
                .with_context(|| format!("Failed to fetch scan id {}", args.id))?;
            println!("{}", serde_json::to_string_pretty(&details)?);
        }
        Commands::Init => {
            config::init_config(&std::env::current_dir()?)?;
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<NessyncConfig> {
    if cli.no_config {
        return Ok(NessyncConfig::default());
    }
    if let Some(ref path) = cli.config {
        return NessyncConfig::from_file(path);
    }
    let cwd = std::env::current_dir()?;
    Ok(NessyncConfig::discover(&cwd).unwrap_or_default())
}

fn client(config: &NessyncConfig, keys: &cli::commands::ApiKeyArgs) -> Result<TenableClient> {
    let credentials = Credentials::new(&keys.access_key, &keys.secret_key)?;
    let client = TenableClient::new(&config.api, &credentials)?;
    debug!("Using plugin endpoint {}", client.endpoint());
    Ok(client)
}

fn write_json(path: &std::path::Path, value: &serde_json::Value, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn print_report(report: &SyncReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", report::json::render(report)?),
        OutputFormat::Terminal => report::terminal::render(report),
    }
    Ok(())
}
