//! Flat-file persistence. Every stage hands off to the next through these
//! paths; nothing is passed in memory between commands.

use crate::aggregator::MergedTable;
use crate::error::Error;
use crate::loader::load_price_table;
use crate::models::PriceBar;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Could not create dir {:?}", parent))?;
    }
    Ok(())
}

/// Write via a sibling temp file so a failed write never leaves a half file
/// under the final name.
fn write_atomic(path: &Path, write: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    if let Err(e) = write(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path).with_context(|| format!("Could not move {:?} into place", tmp))
}

// ── Ticker store ──────────────────────────────────────────────────────────────

/// The scraped ticker list, kept as a JSON array.
pub struct TickerStore {
    path: PathBuf,
}

impl TickerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn save(&self, tickers: &[String]) -> Result<()> {
        ensure_parent(&self.path)?;
        write_atomic(&self.path, |tmp| {
            let json = serde_json::to_vec_pretty(tickers)?;
            fs::write(tmp, json).with_context(|| format!("Could not write {:?}", tmp))
        })?;
        info!("Saved {} tickers to {:?}", tickers.len(), self.path);
        Ok(())
    }

    pub fn load(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Err(Error::MissingTickerStore(self.path.clone()).into());
        }
        let bytes = fs::read(&self.path)
            .with_context(|| format!("Could not read {:?}", self.path))?;
        let tickers: Vec<String> = serde_json::from_slice(&bytes)
            .with_context(|| format!("Corrupt ticker store {:?}", self.path))?;
        debug!("Loaded {} tickers from {:?}", tickers.len(), self.path);
        Ok(tickers)
    }
}

// ── Per-ticker price files ────────────────────────────────────────────────────

/// One `<TICKER>.csv` per symbol under a single directory.
pub struct PriceStore {
    dir: PathBuf,
}

impl PriceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", symbol))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.path_for(symbol).is_file()
    }

    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Could not create dir {:?}", self.dir))
    }

    /// Delete every file in the directory, then make sure it exists.
    /// Returns how many files were removed.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        if self.dir.exists() {
            for entry in fs::read_dir(&self.dir)? {
                let path = entry?.path();
                if path.is_file() {
                    fs::remove_file(&path)
                        .with_context(|| format!("Could not remove {:?}", path))?;
                    removed += 1;
                }
            }
        }
        self.ensure_dir()?;
        info!("Cleared {} price files from {:?}", removed, self.dir);
        Ok(removed)
    }

    pub fn write(&self, symbol: &str, bars: &[PriceBar]) -> Result<PathBuf> {
        let path = self.path_for(symbol);
        write_atomic(&path, |tmp| {
            let mut writer = csv::Writer::from_path(tmp)
                .with_context(|| format!("Could not create {:?}", tmp))?;
            for bar in bars {
                writer.serialize(bar)?;
            }
            writer.flush()?;
            Ok(())
        })?;
        Ok(path)
    }

    pub fn read(&self, symbol: &str) -> Result<Vec<PriceBar>> {
        load_price_table(&self.path_for(symbol))
    }
}

// ── Merged table ──────────────────────────────────────────────────────────────

/// `Date,<t1>,<t2>,…` with ISO dates and empty cells for gaps.
pub fn write_merged_table(path: &Path, table: &MergedTable) -> Result<()> {
    ensure_parent(path)?;
    write_atomic(path, |tmp| {
        let mut writer = csv::Writer::from_path(tmp)
            .with_context(|| format!("Could not create {:?}", tmp))?;

        let mut header = vec!["Date".to_string()];
        header.extend(table.columns().iter().cloned());
        writer.write_record(&header)?;

        for (date, values) in table.rows() {
            let mut record = Vec::with_capacity(values.len() + 1);
            record.push(date.format("%Y-%m-%d").to_string());
            record.extend(values.iter().map(|v| v.map(|x| x.to_string()).unwrap_or_default()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    })?;
    info!(
        "Wrote merged table {:?} ({} columns × {} rows)",
        path,
        table.columns().len(),
        table.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn test_ticker_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TickerStore::new(dir.path().join("nested/tickers.json"));
        let tickers = vec!["III.L".to_string(), "RRL".to_string(), "BT.A.L".to_string()];

        store.save(&tickers).unwrap();
        assert_eq!(store.load().unwrap(), tickers);
    }

    #[test]
    fn test_ticker_store_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = TickerStore::new(dir.path().join("none.json")).load().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MissingTickerStore(_))
        ));
    }

    #[test]
    fn test_price_store_write_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = PriceStore::new(dir.path());
        let bars = vec![
            PriceBar {
                date: d(1),
                open: Some(1.0),
                high: Some(2.0),
                low: Some(0.5),
                close: Some(1.5),
                adj_close: Some(1.4),
                volume: Some(1_000),
            },
            PriceBar::adj_only(d(4), 1.6),
        ];

        let path = store.write("III.L", &bars).unwrap();
        assert!(path.ends_with("III.L.csv"));
        assert!(store.contains("III.L"));

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Date,Open,High,Low,Close,Adj Close,Volume\n"));

        assert_eq!(store.read("III.L").unwrap(), bars);
    }

    #[test]
    fn test_price_store_clear_recreates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let prices = dir.path().join("prices");
        let store = PriceStore::new(&prices);

        assert_eq!(store.clear().unwrap(), 0);
        assert!(prices.is_dir());

        store.write("A.L", &[PriceBar::adj_only(d(1), 1.0)]).unwrap();
        fs::write(prices.join("stale.txt"), "x").unwrap();
        assert_eq!(store.clear().unwrap(), 2);
        assert!(!store.contains("A.L"));
        assert!(prices.is_dir());
    }
}
