//! CSV readers for the files the pipeline persists.

use crate::aggregator::MergedTable;
use crate::models::PriceBar;
use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use std::path::Path;
use tracing::debug;

/// Read a per-ticker file: Date, Open, High, Low, Close, Adj Close, Volume.
/// Any unreadable row fails the whole file.
pub fn load_price_table(path: &Path) -> Result<Vec<PriceBar>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Could not open {:?}", path))?;

    let mut bars = Vec::new();
    for (i, result) in reader.deserialize::<PriceBar>().enumerate() {
        let bar = result.with_context(|| format!("Row {} in {:?}", i + 1, path))?;
        bars.push(bar);
    }

    debug!("{:?}: {} bars", path, bars.len());
    Ok(bars)
}

/// Read the merged table back: first column is the date, the rest are
/// ticker columns whose empty cells are gaps.
pub fn load_merged_table(path: &Path) -> Result<MergedTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Could not open merged table {:?}", path))?;

    let headers = reader.headers()?.clone();
    if headers.get(0) != Some("Date") {
        bail!("Merged table {:?} does not start with a Date column", path);
    }
    let columns: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
    let mut table = MergedTable::with_columns(columns);

    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Row {} in {:?}", i + 1, path))?;

        let date_str = record.get(0).unwrap_or_default();
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .with_context(|| format!("Bad date {:?} on row {}", date_str, i + 1))?;

        let values = record
            .iter()
            .skip(1)
            .map(|cell| match cell.trim() {
                "" => Ok(None),
                s => s
                    .parse::<f64>()
                    .map(Some)
                    .with_context(|| format!("Bad value {:?} on row {}", s, i + 1)),
            })
            .collect::<Result<Vec<_>>>()?;

        table.insert_row(date, values)?;
    }

    Ok(table)
}
