use crate::error::Error;
use crate::models::PriceBar;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use ::scraper::{Html, Selector};
use serde::Deserialize;
use tracing::debug;

fn selector(s: &str) -> Result<Selector, Error> {
    Selector::parse(s).map_err(|_| Error::Selector(s.to_string()))
}

// ── Listing page ──────────────────────────────────────────────────────────────

/// Raw EPIC text from the constituents table: second `td` of every row after
/// the header row. Rows without a second cell are skipped.
pub fn parse_listing_page(html: &str, table_selector: &str) -> Result<Vec<String>> {
    let doc = Html::parse_document(html);

    let table_sel = selector(table_selector)?;
    let tr_sel = selector("tr")?;
    let td_sel = selector("td")?;

    let table = doc
        .select(&table_sel)
        .next()
        .ok_or_else(|| Error::TableNotFound(table_selector.to_string()))?;

    let mut raw = Vec::new();
    for (i, tr) in table.select(&tr_sel).enumerate().skip(1) {
        let Some(cell) = tr.select(&td_sel).nth(1) else {
            debug!("Listing row {} has no second cell, skipping", i);
            continue;
        };
        let text = cell.text().collect::<String>().trim().to_string();
        if !text.is_empty() {
            raw.push(text);
        }
    }

    Ok(raw)
}

// ── Yahoo chart API ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<Option<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Default, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

fn at<T: Copy>(v: &[Option<T>], i: usize) -> Option<T> {
    v.get(i).copied().flatten()
}

/// Turn a `/v8/finance/chart` response body into daily bars.
///
/// Timestamps are shifted by the exchange's `gmtoffset` before taking the
/// calendar date. When the provider repeats a date (intraday snapshot of the
/// current session) the later row wins.
pub fn parse_chart_response(symbol: &str, body: &str) -> Result<Vec<PriceBar>> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .with_context(|| format!("Malformed chart response for {}", symbol))?;

    if let Some(err) = envelope.chart.error {
        return Err(Error::Provider {
            symbol: symbol.to_string(),
            message: err
                .description
                .or(err.code)
                .unwrap_or_else(|| "unknown error".to_string()),
        }
        .into());
    }

    let result = envelope
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| Error::EmptySeries(symbol.to_string()))?;

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adj = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .unwrap_or_default();
    let offset = result.meta.gmtoffset;

    let mut bars: Vec<PriceBar> = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        let Some(date) = ts.and_then(|t| timestamp_to_date(t, offset)) else {
            continue;
        };

        let bar = PriceBar {
            date,
            open: at(&quote.open, i),
            high: at(&quote.high, i),
            low: at(&quote.low, i),
            close: at(&quote.close, i),
            adj_close: at(&adj.adjclose, i),
            volume: at(&quote.volume, i),
        };

        match bars.last_mut() {
            Some(last) if last.date == date => *last = bar,
            _ => bars.push(bar),
        }
    }

    if bars.is_empty() {
        return Err(Error::EmptySeries(symbol.to_string()).into());
    }
    Ok(bars)
}

fn timestamp_to_date(ts: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts + gmtoffset, 0).map(|dt| dt.date_naive())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
