use crate::config::ProviderConfig;
use crate::models::{DateRange, PriceBar};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use tracing::debug;
use url::Url;

use super::PriceSource;
use super::http_client::HttpClient;
use super::parsers::parse_chart_response;

/// Daily history from Yahoo Finance's chart endpoint.
pub struct YahooClient {
    client: HttpClient,
    base_url: String,
}

impl YahooClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// e.g. /v8/finance/chart/III.L?period1=…&period2=…&interval=1d
    /// `period2` is the day after `range.end` so the end date is included.
    fn chart_url(&self, symbol: &str, range: &DateRange) -> Result<Url> {
        let period1 = midnight_utc(range.start);
        let period2 = midnight_utc(
            range
                .end
                .checked_add_days(Days::new(1))
                .unwrap_or(range.end),
        );

        Url::parse_with_params(
            &format!("{}/v8/finance/chart/{}", self.base_url, symbol),
            &[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("events", "history".to_string()),
                ("includeAdjustedClose", "true".to_string()),
            ],
        )
        .with_context(|| format!("Bad chart URL for {}", symbol))
    }
}

fn midnight_utc(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

#[async_trait]
impl PriceSource for YahooClient {
    async fn fetch_history(&self, symbol: &str, range: &DateRange) -> Result<Vec<PriceBar>> {
        let url = self.chart_url(symbol, range)?;
        let (status, body) = self.client.get(url.as_str()).await?;

        // Yahoo reports unknown symbols as 404 with a JSON error body, so try
        // the body first and only fall back to the bare status.
        match parse_chart_response(symbol, &body) {
            Ok(bars) => {
                debug!("{}: {} bars ({} → {})", symbol, bars.len(), range.start, range.end);
                Ok(bars)
            }
            Err(e) if status.is_success() => Err(e),
            Err(e) => Err(e.context(format!("HTTP {}", status))),
        }
    }
}
