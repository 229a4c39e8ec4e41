//! Pipeline orchestrator: listing → price files → merged table → matrix.
//!
//! ## Stages
//!
//! Every stage reads the previous stage's files, so each can be run on its
//! own from the CLI:
//!   1. `tickers`  scrape (or reload) the constituent list → ticker store
//!   2. `fetch_all` one CSV per ticker under the price directory
//!   3. `compile`  outer-join adjusted closes → merged table
//!   4. `load_matrix` merged table → correlation matrix for display
//!
//! Per-ticker failures in stages 2 and 3 are recorded and skipped; anything
//! else aborts.

use crate::aggregator::{Aggregator, CompileReport};
use crate::analysis::{CorrelationMatrix, correlation_matrix};
use crate::config::{AppConfig, StorageConfig};
use crate::error::Error;
use crate::loader::load_merged_table;
use crate::models::{DateRange, TickerOutcome};
use crate::scraper::{ConstituentSource, PriceSource, WikipediaScraper, YahooClient};
use crate::storage::{PriceStore, TickerStore};
use anyhow::{Context, Result};
use tracing::{debug, info, warn};

pub struct Pipeline {
    storage: StorageConfig,
    constituents: Box<dyn ConstituentSource>,
    prices: Box<dyn PriceSource>,
}

impl Pipeline {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let constituents = WikipediaScraper::new(&config.listing, &config.provider)
            .context("Failed to build listing scraper")?;
        let prices = YahooClient::new(&config.provider).context("Failed to build quote client")?;
        Ok(Self::with_sources(
            config.storage.clone(),
            Box::new(constituents),
            Box::new(prices),
        ))
    }

    pub fn with_sources(
        storage: StorageConfig,
        constituents: Box<dyn ConstituentSource>,
        prices: Box<dyn PriceSource>,
    ) -> Self {
        Self {
            storage,
            constituents,
            prices,
        }
    }

    fn ticker_store(&self) -> TickerStore {
        TickerStore::new(&self.storage.ticker_store)
    }

    // ── 1. Tickers ────────────────────────────────────────────────────────────

    /// Scrape and persist the listing when `reload`, otherwise read the store.
    pub async fn tickers(&self, reload: bool) -> Result<Vec<String>> {
        let store = self.ticker_store();
        if !reload {
            return store.load();
        }

        let tickers = self
            .constituents
            .fetch_constituents()
            .await
            .context("Ticker list fetch failed")?;
        store.save(&tickers)?;
        Ok(tickers)
    }

    // ── 2. Prices ─────────────────────────────────────────────────────────────

    /// Download every ticker that has no price file yet, one at a time.
    /// `force_refresh` wipes the directory first so everything is refetched.
    pub async fn fetch_all(
        &self,
        tickers: &[String],
        range: &DateRange,
        force_refresh: bool,
    ) -> Result<FetchReport> {
        let store = PriceStore::new(&self.storage.price_dir);
        if force_refresh {
            store.clear()?;
        } else {
            store.ensure_dir()?;
        }

        info!(
            "Fetching {} tickers ({} → {})",
            tickers.len(),
            range.start,
            range.end
        );

        let mut report = FetchReport::default();
        for symbol in tickers {
            let outcome = self.fetch_one(&store, symbol, range).await;
            match &outcome {
                TickerOutcome::Fetched { symbol, bars } => info!("{}: {} bars", symbol, bars),
                TickerOutcome::AlreadyPresent { symbol } => debug!("{}: already on disk", symbol),
                TickerOutcome::Failed { symbol, reason } => warn!("{}: skipped ({})", symbol, reason),
            }
            report.outcomes.push(outcome);
        }

        info!(
            "Fetch done: {} fetched, {} already present, {} failed",
            report.fetched(),
            report.already_present(),
            report.failed()
        );
        Ok(report)
    }

    /// Whether any ticker still lacks a price file.
    pub fn has_missing_prices(&self, tickers: &[String]) -> bool {
        let store = PriceStore::new(&self.storage.price_dir);
        tickers.iter().any(|t| !store.contains(t))
    }

    async fn fetch_one(&self, store: &PriceStore, symbol: &str, range: &DateRange) -> TickerOutcome {
        if store.contains(symbol) {
            return TickerOutcome::AlreadyPresent {
                symbol: symbol.to_string(),
            };
        }

        let result = async {
            let bars = self.prices.fetch_history(symbol, range).await?;
            store.write(symbol, &bars)?;
            Ok::<usize, anyhow::Error>(bars.len())
        }
        .await;

        match result {
            Ok(bars) => TickerOutcome::Fetched {
                symbol: symbol.to_string(),
                bars,
            },
            Err(e) => TickerOutcome::Failed {
                symbol: symbol.to_string(),
                reason: format!("{:#}", e),
            },
        }
    }

    // ── 3. Merge ──────────────────────────────────────────────────────────────

    pub fn compile(&self, tickers: &[String]) -> Result<CompileReport> {
        Aggregator::new(&self.storage).compile(tickers)
    }

    // ── 4. Correlation ────────────────────────────────────────────────────────

    pub fn load_matrix(&self) -> Result<CorrelationMatrix> {
        let path = &self.storage.merged_table;
        let table = load_merged_table(path)?;
        if table.columns().is_empty() {
            return Err(Error::EmptyMergedTable(path.clone()).into());
        }
        info!(
            "Correlating {} tickers over {} dates",
            table.columns().len(),
            table.len()
        );
        Ok(correlation_matrix(&table))
    }
}

#[derive(Debug, Default)]
pub struct FetchReport {
    pub outcomes: Vec<TickerOutcome>,
}

impl FetchReport {
    fn count(&self, pred: impl Fn(&TickerOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }

    pub fn fetched(&self) -> usize {
        self.count(|o| matches!(o, TickerOutcome::Fetched { .. }))
    }

    pub fn already_present(&self) -> usize {
        self.count(|o| matches!(o, TickerOutcome::AlreadyPresent { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TickerOutcome::Failed { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceBar;
    use anyhow::bail;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, day).unwrap()
    }

    fn range() -> DateRange {
        DateRange::new(d(1), d(29))
    }

    struct FakeListing(Vec<String>);

    #[async_trait]
    impl ConstituentSource for FakeListing {
        async fn fetch_constituents(&self) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    struct FailingListing;

    #[async_trait]
    impl ConstituentSource for FailingListing {
        async fn fetch_constituents(&self) -> Result<Vec<String>> {
            bail!("connection refused")
        }
    }

    #[derive(Clone, Default)]
    struct FakeQuotes {
        data: HashMap<String, Vec<PriceBar>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakeQuotes {
        fn with(mut self, symbol: &str, points: &[(u32, f64)]) -> Self {
            let bars = points.iter().map(|&(day, v)| PriceBar::adj_only(d(day), v)).collect();
            self.data.insert(symbol.to_string(), bars);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PriceSource for FakeQuotes {
        async fn fetch_history(&self, symbol: &str, _range: &DateRange) -> Result<Vec<PriceBar>> {
            self.calls.lock().unwrap().push(symbol.to_string());
            match self.data.get(symbol) {
                Some(bars) => Ok(bars.clone()),
                None => Err(Error::Provider {
                    symbol: symbol.to_string(),
                    message: "No data found, symbol may be delisted".to_string(),
                }
                .into()),
            }
        }
    }

    fn storage(root: &Path) -> StorageConfig {
        StorageConfig {
            ticker_store: root.join("tickers.json"),
            price_dir: root.join("prices"),
            merged_table: root.join("joined.csv"),
        }
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_tickers_reload_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let listing = names(&["III.L", "RRL", "BT.A.L"]);
        let pipeline = Pipeline::with_sources(
            storage(dir.path()),
            Box::new(FakeListing(listing.clone())),
            Box::new(FakeQuotes::default()),
        );

        assert_eq!(pipeline.tickers(true).await.unwrap(), listing);
        assert_eq!(pipeline.tickers(false).await.unwrap(), listing);
    }

    #[tokio::test]
    async fn test_tickers_without_store_or_reload_fails() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::with_sources(
            storage(dir.path()),
            Box::new(FakeListing(vec![])),
            Box::new(FakeQuotes::default()),
        );
        let err = pipeline.tickers(false).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MissingTickerStore(_))
        ));
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal_and_keeps_old_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = storage(dir.path());
        TickerStore::new(&config.ticker_store)
            .save(&names(&["OLD.L"]))
            .unwrap();

        let pipeline = Pipeline::with_sources(
            config,
            Box::new(FailingListing),
            Box::new(FakeQuotes::default()),
        );
        assert!(pipeline.tickers(true).await.is_err());
        assert_eq!(pipeline.tickers(false).await.unwrap(), names(&["OLD.L"]));
    }

    #[tokio::test]
    async fn test_fetch_all_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        let quotes = FakeQuotes::default().with("AAA.L", &[(1, 10.0), (2, 11.0)]);
        let pipeline = Pipeline::with_sources(
            storage(dir.path()),
            Box::new(FakeListing(vec![])),
            Box::new(quotes),
        );

        let report = pipeline
            .fetch_all(&names(&["AAA.L", "BBB.L"]), &range(), false)
            .await
            .unwrap();

        assert_eq!(report.fetched(), 1);
        assert_eq!(report.failed(), 1);
        assert!(pipeline.has_missing_prices(&names(&["AAA.L", "BBB.L"])));
        assert!(!pipeline.has_missing_prices(&names(&["AAA.L"])));
        assert!(dir.path().join("prices/AAA.L.csv").is_file());
        assert!(!dir.path().join("prices/BBB.L.csv").exists());
    }

    #[tokio::test]
    async fn test_fetch_all_leaves_existing_files_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let config = storage(dir.path());
        let quotes = FakeQuotes::default()
            .with("AAA.L", &[(1, 10.0)])
            .with("CCC.L", &[(1, 5.0)]);
        let pipeline = Pipeline::with_sources(
            config.clone(),
            Box::new(FakeListing(vec![])),
            Box::new(quotes.clone()),
        );

        pipeline
            .fetch_all(&names(&["AAA.L"]), &range(), false)
            .await
            .unwrap();
        let path = config.price_dir.join("AAA.L.csv");
        let before = std::fs::read(&path).unwrap();
        let mtime = std::fs::metadata(&path).unwrap().modified().unwrap();

        let report = pipeline
            .fetch_all(&names(&["AAA.L", "CCC.L"]), &range(), false)
            .await
            .unwrap();

        assert_eq!(report.already_present(), 1);
        assert_eq!(report.fetched(), 1);
        assert_eq!(quotes.calls(), names(&["AAA.L", "CCC.L"]));
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), mtime);
    }

    #[tokio::test]
    async fn test_force_refresh_wipes_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = storage(dir.path());
        let prices = PriceStore::new(&config.price_dir);
        prices.ensure_dir().unwrap();
        prices
            .write("GONE.L", &[PriceBar::adj_only(d(1), 1.0)])
            .unwrap();

        let quotes = FakeQuotes::default().with("AAA.L", &[(1, 10.0)]);
        let pipeline = Pipeline::with_sources(
            config,
            Box::new(FakeListing(vec![])),
            Box::new(quotes),
        );
        pipeline
            .fetch_all(&names(&["AAA.L"]), &range(), true)
            .await
            .unwrap();

        assert!(!prices.contains("GONE.L"));
        assert!(prices.contains("AAA.L"));
    }

    #[test]
    fn test_end_to_end_missing_ticker_drops_column() {
        let dir = tempfile::tempdir().unwrap();
        let quotes = FakeQuotes::default()
            .with("AAA.L", &[(1, 10.0), (2, 11.0), (3, 12.5)])
            .with("CCC.L", &[(2, 3.0), (3, 1.0), (4, 2.0)]);
        let pipeline = Pipeline::with_sources(
            storage(dir.path()),
            Box::new(FakeListing(names(&["AAA.L", "BBB.L", "CCC.L"]))),
            Box::new(quotes),
        );

        let matrix = tokio_test::block_on(async {
            let tickers = pipeline.tickers(true).await?;
            pipeline.fetch_all(&tickers, &range(), false).await?;
            let report = pipeline.compile(&tickers)?;
            assert_eq!(report.joined(), 2);
            pipeline.load_matrix()
        })
        .unwrap();

        assert_eq!(matrix.labels(), ["AAA.L", "CCC.L"]);
        assert_eq!(matrix.get(0, 0), Some(1.0));
        assert_eq!(matrix.get(1, 1), Some(1.0));
        // overlap on days 2 and 3 only: (11, 3), (12.5, 1)
        assert!((matrix.get(0, 1).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_load_matrix_rejects_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::with_sources(
            storage(dir.path()),
            Box::new(FakeListing(vec![])),
            Box::new(FakeQuotes::default()),
        );

        let report = pipeline.compile(&names(&["NOPE.L"])).unwrap();
        assert_eq!(report.skipped(), 1);

        let err = pipeline.load_matrix().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::EmptyMergedTable(_))
        ));
    }
}
