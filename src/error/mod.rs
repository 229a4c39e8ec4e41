use std::path::PathBuf;
use thiserror::Error;

/// Failure kinds callers may want to match on. Everything else travels as
/// `anyhow::Error` with context attached.
#[derive(Debug, Error)]
pub enum Error {
    #[error("ticker store {0:?} not found; run with --reload to scrape the listing first")]
    MissingTickerStore(PathBuf),

    #[error("no table matching `{0}` on listing page")]
    TableNotFound(String),

    #[error("listing table produced no tickers")]
    NoTickers,

    #[error("invalid CSS selector `{0}`")]
    Selector(String),

    #[error("provider error for {symbol}: {message}")]
    Provider { symbol: String, message: String },

    #[error("provider returned no rows for {0}")]
    EmptySeries(String),

    #[error("merged table {0:?} has no ticker columns")]
    EmptyMergedTable(PathBuf),
}
