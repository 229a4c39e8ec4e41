use crate::config::ProviderConfig;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Thin wrapper over `reqwest::Client` shared by the listing scraper and the
/// quote provider. One request at a time, no retries.
pub struct HttpClient {
    inner: reqwest::Client,
    request_delay: Duration,
}

impl HttpClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Yahoo hands out a consent cookie on first contact
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            request_delay: Duration::from_millis(config.request_delay_ms),
        })
    }

    /// GET a URL and return the status with the body, whatever the status.
    pub async fn get(&self, url: &str) -> Result<(StatusCode, String)> {
        self.polite_delay().await;
        debug!("GET {}", url);

        let resp = self
            .inner
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .context("Failed to read response body")?;
        Ok((status, body))
    }

    /// GET a URL as text, treating any non-2xx status as an error.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let (status, body) = self.get(url).await?;
        if !status.is_success() {
            anyhow::bail!("HTTP {} from {}", status, url);
        }
        Ok(body)
    }

    async fn polite_delay(&self) {
        if !self.request_delay.is_zero() {
            sleep(self.request_delay).await;
        }
    }
}
