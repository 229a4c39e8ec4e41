pub mod cleaner;
pub mod http_client;
pub mod parsers;
pub mod yahoo;

use crate::config::{ListingConfig, ProviderConfig};
use crate::error::Error;
use crate::models::{DateRange, PriceBar};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use self::cleaner::clean_ticker_rows;
use self::http_client::HttpClient;
use self::parsers::parse_listing_page;

pub use self::yahoo::YahooClient;

// ── Source traits ─────────────────────────────────────────────────────────────

/// Where the index constituents come from.
#[async_trait]
pub trait ConstituentSource: Send + Sync {
    async fn fetch_constituents(&self) -> Result<Vec<String>>;
}

/// Where daily price history comes from.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_history(&self, symbol: &str, range: &DateRange) -> Result<Vec<PriceBar>>;
}

// ── Wikipedia listing scraper ─────────────────────────────────────────────────

pub struct WikipediaScraper {
    client: HttpClient,
    config: ListingConfig,
}

impl WikipediaScraper {
    pub fn new(config: &ListingConfig, http: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(http)?,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl ConstituentSource for WikipediaScraper {
    async fn fetch_constituents(&self) -> Result<Vec<String>> {
        info!("Fetching constituents from {}", self.config.url);

        let html = self
            .client
            .get_text(&self.config.url)
            .await
            .context("Failed to fetch listing page")?;

        let raw = parse_listing_page(&html, &self.config.table_selector)?;
        let tickers = clean_ticker_rows(raw, &self.config.suffix);

        if tickers.is_empty() {
            return Err(Error::NoTickers.into());
        }

        info!("{} constituents discovered", tickers.len());
        Ok(tickers)
    }
}
