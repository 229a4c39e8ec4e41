use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ── Date range ────────────────────────────────────────────────────────────────

/// Inclusive range of calendar days to request history for.
/// `start <= end` is left to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// From `start` up to today (UTC).
    pub fn until_today(start: NaiveDate) -> Self {
        Self::new(start, chrono::Utc::now().date_naive())
    }
}

// ── Daily price bar ───────────────────────────────────────────────────────────

/// One row of a per-ticker price file.
/// Column names match the on-disk header: Date,Open,High,Low,Close,Adj Close,Volume
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceBar {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Open")]
    pub open: Option<f64>,
    #[serde(rename = "High")]
    pub high: Option<f64>,
    #[serde(rename = "Low")]
    pub low: Option<f64>,
    #[serde(rename = "Close")]
    pub close: Option<f64>,
    #[serde(rename = "Adj Close")]
    pub adj_close: Option<f64>,
    #[serde(rename = "Volume")]
    pub volume: Option<u64>,
}

impl PriceBar {
    /// Bar carrying only a date and an adjusted close. Handy for fixtures.
    #[cfg(test)]
    pub fn adj_only(date: NaiveDate, adj_close: f64) -> Self {
        Self {
            date,
            open: None,
            high: None,
            low: None,
            close: None,
            adj_close: Some(adj_close),
            volume: None,
        }
    }
}

// ── Per-ticker outcomes ───────────────────────────────────────────────────────

/// Result of trying to download one ticker.
#[derive(Debug, Clone, PartialEq)]
pub enum TickerOutcome {
    Fetched { symbol: String, bars: usize },
    AlreadyPresent { symbol: String },
    Failed { symbol: String, reason: String },
}

/// Result of trying to fold one ticker's file into the merged table.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnOutcome {
    Joined { symbol: String, rows: usize },
    Skipped { symbol: String, reason: String },
}
