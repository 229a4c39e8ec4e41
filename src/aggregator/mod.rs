//! Merge per-ticker price files into one date-indexed table of adjusted
//! closes, one column per ticker.
//!
//! ## Join rules
//!
//! Tickers are folded left to right. Each new column is outer-joined on the
//! date key: the row set becomes the union of dates seen so far, and any row
//! a column has no value for holds `None`. A ticker whose file is missing or
//! unreadable contributes nothing and leaves no placeholder column, so the
//! final column order is the input order of the tickers that were read.

use crate::config::StorageConfig;
use crate::models::{ColumnOutcome, PriceBar};
use crate::storage::{PriceStore, write_merged_table};
use anyhow::{Result, bail};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

// ── Merged table ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedTable {
    columns: Vec<String>,
    rows: BTreeMap<NaiveDate, Vec<Option<f64>>>,
}

impl MergedTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: BTreeMap::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Rows in ascending date order.
    pub fn rows(&self) -> impl Iterator<Item = (&NaiveDate, &[Option<f64>])> {
        self.rows.iter().map(|(d, v)| (d, v.as_slice()))
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.keys().copied().collect()
    }

    pub fn get(&self, date: NaiveDate, column: &str) -> Option<f64> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(&date).and_then(|row| row[idx])
    }

    /// One column down every row, gaps included.
    pub fn column_values(&self, idx: usize) -> Vec<Option<f64>> {
        self.rows.values().map(|row| row.get(idx).copied().flatten()).collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn insert_row(&mut self, date: NaiveDate, values: Vec<Option<f64>>) -> Result<()> {
        if values.len() != self.columns.len() {
            bail!(
                "Row {} has {} values for {} columns",
                date,
                values.len(),
                self.columns.len()
            );
        }
        self.rows.insert(date, values);
        Ok(())
    }

    /// Outer-join one more named series on the date key.
    pub fn join_column(
        &mut self,
        name: impl Into<String>,
        series: impl IntoIterator<Item = (NaiveDate, Option<f64>)>,
    ) {
        let idx = self.columns.len();
        self.columns.push(name.into());
        for row in self.rows.values_mut() {
            row.push(None);
        }

        let width = self.columns.len();
        for (date, value) in series {
            let row = self.rows.entry(date).or_insert_with(|| vec![None; width]);
            row[idx] = value;
        }
    }
}

// ── Compile ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct CompileReport {
    pub outcomes: Vec<ColumnOutcome>,
}

impl CompileReport {
    pub fn joined(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ColumnOutcome::Joined { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.joined()
    }
}

/// Fold every readable ticker's adjusted close into one table.
///
/// `read` supplies a ticker's price table; its errors are recorded as
/// skips, never returned.
pub fn compile<F>(tickers: &[String], mut read: F) -> (MergedTable, CompileReport)
where
    F: FnMut(&str) -> Result<Vec<PriceBar>>,
{
    let mut table = MergedTable::new();
    let mut report = CompileReport::default();

    for symbol in tickers {
        if table.has_column(symbol) {
            report.outcomes.push(ColumnOutcome::Skipped {
                symbol: symbol.clone(),
                reason: "duplicate ticker".to_string(),
            });
            continue;
        }

        match read(symbol) {
            Ok(bars) => {
                let rows = bars.len();
                table.join_column(symbol.as_str(), bars.into_iter().map(|b| (b.date, b.adj_close)));
                report.outcomes.push(ColumnOutcome::Joined {
                    symbol: symbol.clone(),
                    rows,
                });
            }
            Err(e) => {
                debug!("{}: skipped ({:#})", symbol, e);
                report.outcomes.push(ColumnOutcome::Skipped {
                    symbol: symbol.clone(),
                    reason: format!("{:#}", e),
                });
            }
        }
    }

    (table, report)
}

/// Reads from the price directory and persists the merged table.
pub struct Aggregator {
    prices: PriceStore,
    merged_path: PathBuf,
}

impl Aggregator {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            prices: PriceStore::new(&config.price_dir),
            merged_path: config.merged_table.clone(),
        }
    }

    pub fn compile(&self, tickers: &[String]) -> Result<CompileReport> {
        info!("Compiling {} tickers", tickers.len());
        let (table, report) = compile(tickers, |symbol| self.prices.read(symbol));
        write_merged_table(&self.merged_path, &table)?;
        info!(
            "{} columns joined, {} skipped, {} dates",
            report.joined(),
            report.skipped(),
            table.len()
        );
        Ok(report)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_merged_table;
    use std::collections::HashMap;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn series(points: &[(u32, f64)]) -> Vec<PriceBar> {
        points.iter().map(|&(day, v)| PriceBar::adj_only(d(day), v)).collect()
    }

    fn tickers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn reader(
        data: HashMap<&'static str, Vec<PriceBar>>,
    ) -> impl FnMut(&str) -> Result<Vec<PriceBar>> {
        move |symbol| match data.get(symbol) {
            Some(bars) => Ok(bars.clone()),
            None => bail!("no file for {}", symbol),
        }
    }

    #[test]
    fn test_compile_nothing_readable_is_empty() {
        let (table, report) = compile(&tickers(&["X.L", "Y.L"]), reader(HashMap::new()));
        assert!(table.columns().is_empty());
        assert!(table.is_empty());
        assert_eq!(report.skipped(), 2);
    }

    #[test]
    fn test_compile_outer_join_fills_gaps() {
        let data = HashMap::from([
            ("A", series(&[(1, 1.0), (2, 2.0), (3, 3.0)])),
            ("B", series(&[(2, 20.0), (3, 30.0), (4, 40.0)])),
        ]);
        let (table, _) = compile(&tickers(&["A", "B"]), reader(data));

        assert_eq!(table.dates(), vec![d(1), d(2), d(3), d(4)]);
        assert_eq!(table.get(d(1), "A"), Some(1.0));
        assert_eq!(table.get(d(1), "B"), None);
        assert_eq!(table.get(d(4), "A"), None);
        assert_eq!(table.get(d(4), "B"), Some(40.0));
        assert_eq!(table.column_values(1), vec![None, Some(20.0), Some(30.0), Some(40.0)]);
    }

    #[test]
    fn test_compile_column_order_skips_without_gaps() {
        let data = HashMap::from([
            ("C", series(&[(1, 3.0)])),
            ("A", series(&[(2, 1.0)])),
        ]);
        let (table, report) = compile(&tickers(&["C", "MISSING", "A"]), reader(data));

        assert_eq!(table.columns(), ["C", "A"]);
        assert_eq!(report.joined(), 2);
        assert!(matches!(
            &report.outcomes[1],
            ColumnOutcome::Skipped { symbol, .. } if symbol == "MISSING"
        ));
    }

    #[test]
    fn test_compile_duplicate_ticker_joins_once() {
        let data = HashMap::from([("A", series(&[(1, 1.0)]))]);
        let (table, report) = compile(&tickers(&["A", "A"]), reader(data));
        assert_eq!(table.columns(), ["A"]);
        assert_eq!(report.skipped(), 1);
    }

    #[test]
    fn test_missing_adj_close_keeps_date() {
        let mut bars = series(&[(1, 1.0)]);
        bars.push(PriceBar {
            adj_close: None,
            ..PriceBar::adj_only(d(2), 0.0)
        });
        let (table, _) = compile(&tickers(&["A"]), reader(HashMap::from([("A", bars)])));
        assert_eq!(table.column_values(0), vec![Some(1.0), None]);
    }

    #[test]
    fn test_aggregator_end_to_end_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            ticker_store: dir.path().join("tickers.json"),
            price_dir: dir.path().join("prices"),
            merged_table: dir.path().join("joined.csv"),
        };
        let prices = PriceStore::new(&config.price_dir);
        prices.ensure_dir().unwrap();
        prices
            .write("AAA.L", &series(&[(1, 10.0), (2, 11.0)]))
            .unwrap();

        let report = Aggregator::new(&config)
            .compile(&tickers(&["AAA.L", "BBB.L"]))
            .unwrap();
        assert_eq!(report.joined(), 1);

        let merged = load_merged_table(&config.merged_table).unwrap();
        assert_eq!(merged.columns(), ["AAA.L"]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.column_values(0), vec![Some(10.0), Some(11.0)]);
    }

    #[test]
    fn test_aggregator_gapped_table_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            ticker_store: dir.path().join("tickers.json"),
            price_dir: dir.path().join("prices"),
            merged_table: dir.path().join("joined.csv"),
        };
        let prices = PriceStore::new(&config.price_dir);
        prices.ensure_dir().unwrap();
        prices
            .write("A.L", &series(&[(1, 1.5), (2, 2.5), (3, 3.5)]))
            .unwrap();
        prices
            .write("B.L", &series(&[(2, 20.5), (3, 30.5), (4, 40.5)]))
            .unwrap();

        Aggregator::new(&config)
            .compile(&tickers(&["A.L", "B.L"]))
            .unwrap();

        let text = std::fs::read_to_string(&config.merged_table).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            [
                "Date,A.L,B.L",
                "2024-05-01,1.5,",
                "2024-05-02,2.5,20.5",
                "2024-05-03,3.5,30.5",
                "2024-05-04,,40.5",
            ]
        );

        let merged = load_merged_table(&config.merged_table).unwrap();
        assert_eq!(merged.columns(), ["A.L", "B.L"]);
        assert_eq!(merged.dates(), vec![d(1), d(2), d(3), d(4)]);
        assert_eq!(
            merged.column_values(0),
            vec![Some(1.5), Some(2.5), Some(3.5), None]
        );
        assert_eq!(
            merged.column_values(1),
            vec![None, Some(20.5), Some(30.5), Some(40.5)]
        );
    }

    #[test]
    fn test_aggregator_corrupt_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            ticker_store: dir.path().join("tickers.json"),
            price_dir: dir.path().join("prices"),
            merged_table: dir.path().join("joined.csv"),
        };
        let prices = PriceStore::new(&config.price_dir);
        prices.ensure_dir().unwrap();
        prices.write("GOOD.L", &series(&[(1, 1.0)])).unwrap();
        std::fs::write(prices.path_for("BAD.L"), "garbage,,\n1,2\n").unwrap();

        let report = Aggregator::new(&config)
            .compile(&tickers(&["BAD.L", "GOOD.L"]))
            .unwrap();
        assert_eq!(report.joined(), 1);
        assert_eq!(report.skipped(), 1);

        let merged = load_merged_table(&config.merged_table).unwrap();
        assert_eq!(merged.columns(), ["GOOD.L"]);
    }
}
