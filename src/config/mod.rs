use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Constituent listing page
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListingConfig {
    #[serde(default = "default_listing_url")]
    pub url: String,

    #[serde(default = "default_table_selector")]
    pub table_selector: String,

    /// Exchange letter appended to every EPIC ("L" → London).
    #[serde(default = "default_suffix")]
    pub suffix: String,
}

/// Historical quote provider
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Where each stage leaves its output for the next one
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_ticker_store")]
    pub ticker_store: PathBuf,

    #[serde(default = "default_price_dir")]
    pub price_dir: PathBuf,

    #[serde(default = "default_merged_table")]
    pub merged_table: PathBuf,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_listing_url() -> String {
    "https://en.wikipedia.org/wiki/FTSE_100_Index".to_string()
}
fn default_table_selector() -> String {
    "table.wikitable.sortable#constituents".to_string()
}
fn default_suffix() -> String {
    "L".to_string()
}
fn default_provider_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    250
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) ftse-corr/0.1".to_string()
}
fn default_ticker_store() -> PathBuf {
    PathBuf::from("data/ftse100_tickers.json")
}
fn default_price_dir() -> PathBuf {
    PathBuf::from("data/stock_dfs_ftse100")
}
fn default_merged_table() -> PathBuf {
    PathBuf::from("data/ftse100_joined_closes.csv")
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            url: default_listing_url(),
            table_selector: default_table_selector(),
            suffix: default_suffix(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_url(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            ticker_store: default_ticker_store(),
            price_dir: default_price_dir(),
            merged_table: default_merged_table(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("FTSE").separator("__"))
            .build()?;

        cfg.try_deserialize().context("Invalid configuration")
    }
}
