use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const CONFIG_FILE_NAME: &str = ".nessync.toml";

pub const DEFAULT_BASE_URL: &str = "https://cloud.tenable.com";
pub const DEFAULT_PAGE_SIZE: u32 = 10_000;
/// Largest page the catalog endpoint accepts
pub const MAX_PAGE_SIZE: u32 = 10_000;
pub const DEFAULT_REQUEST_INTERVAL_SECS: u64 = 3;
pub const DEFAULT_MAX_PAGE_RETRIES: u32 = 10;

/// nessync configuration (loaded from .nessync.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NessyncConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Settings for talking to the plugin catalog API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Root of the API, without trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Entries requested per page (the API caps this at 10000)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Pause between successful page requests, for rate limiting
    #[serde(default = "default_request_interval")]
    pub request_interval_secs: u64,

    /// Pause before re-requesting a page that failed
    #[serde(default = "default_request_interval")]
    pub retry_delay_secs: u64,

    /// Retries allowed per page before giving up. 0 retries forever.
    #[serde(default = "default_max_page_retries")]
    pub max_page_retries: u32,

    /// Whole-request timeout
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default snapshot file for `fetch`
    #[serde(default = "default_out_file")]
    pub file: PathBuf,

    /// Default file for `scans`
    #[serde(default = "default_scans_file")]
    pub scans_file: PathBuf,

    /// Pretty-print snapshot JSON (larger files)
    #[serde(default)]
    pub pretty: bool,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_request_interval() -> u64 {
    DEFAULT_REQUEST_INTERVAL_SECS
}

fn default_max_page_retries() -> u32 {
    DEFAULT_MAX_PAGE_RETRIES
}

fn default_timeout() -> u64 {
    120
}

fn default_out_file() -> PathBuf {
    PathBuf::from("nessus-plugins.json")
}

fn default_scans_file() -> PathBuf {
    PathBuf::from("scans.json")
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: default_base_url(),
            page_size: default_page_size(),
            request_interval_secs: default_request_interval(),
            retry_delay_secs: default_request_interval(),
            max_page_retries: default_max_page_retries(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            file: default_out_file(),
            scans_file: default_scans_file(),
            pretty: false,
        }
    }
}

impl ApiConfig {
    pub fn request_interval(&self) -> Duration {
        Duration::from_secs(self.request_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retry cap for `fetch_all`; `None` means unbounded.
    pub fn max_retries(&self) -> Option<u32> {
        (self.max_page_retries > 0).then_some(self.max_page_retries)
    }

    pub fn plugins_endpoint(&self) -> String {
        format!("{}/plugins/plugin", self.base_url.trim_end_matches('/'))
    }

    pub fn scans_endpoint(&self) -> String {
        format!("{}/scans", self.base_url.trim_end_matches('/'))
    }

    fn validate(&self) -> Result<()> {
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            anyhow::bail!(
                "api.page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE,
                self.page_size
            );
        }
        Ok(())
    }
}

impl NessyncConfig {
    /// Try to load .nessync.toml from the given directory or its parents
    pub fn discover(start: &Path) -> Option<Self> {
        let config_path = find_config_file(start)?;
        debug!("Found config: {}", config_path.display());

        match Self::from_file(&config_path) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Ignoring {}: {:#}", config_path.display(), e);
                None
            }
        }
    }

    /// Load an explicitly named config file. Any failure is an error.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = toml::from_str::<NessyncConfig>(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config
            .api
            .validate()
            .with_context(|| format!("Invalid config {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

/// Walk up from `start` to find .nessync.toml
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let config = current.join(CONFIG_FILE_NAME);
        if config.is_file() {
            return Some(config);
        }
        if !current.pop() {
            return None;
        }
    }
}

const CONFIG_TEMPLATE: &str = r#"# nessync configuration

[api]
# Root of the Tenable API
# base_url = "https://cloud.tenable.com"

# Plugins per page request (max 10000)
# page_size = 10000

# Seconds to wait between page requests (rate limiting)
# request_interval_secs = 3

# Seconds to wait before retrying a failed page
# retry_delay_secs = 3

# Retries per page before the sync aborts. 0 retries forever.
# max_page_retries = 10

# HTTP timeout in seconds
# timeout_secs = 120

[output]
# Snapshot written by `nessync fetch` when --out is not given
file = "nessus-plugins.json"

# Scan list written by `nessync scans` when --out is not given
# scans_file = "scans.json"

# Pretty-print snapshot JSON
# pretty = false
"#;

/// Create a default .nessync.toml in `dir`. Returns false if one already exists.
pub fn init_config(dir: &Path) -> Result<bool> {
    let config_path = dir.join(CONFIG_FILE_NAME);

    if config_path.exists() {
        println!("⚠️  {} already exists in this directory", CONFIG_FILE_NAME);
        return Ok(false);
    }

    std::fs::write(&config_path, CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!("✅ Created {}", CONFIG_FILE_NAME);
    println!("   Edit it to customize API and output settings.");

    Ok(true)
}
