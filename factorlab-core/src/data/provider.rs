//! Quote provider trait and structured error types.
//!
//! The QuoteProvider trait abstracts over remote data sources so the
//! supplier can swap implementations and tests can mock fetches. The
//! store/supplier layers sit above this trait — providers know nothing
//! about local persistence.

use crate::domain::{Bar, Symbol};
use chrono::NaiveDate;
use thiserror::Error;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("store error: {0}")]
    StoreError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("concurrent writer updated the store for '{symbol}' — retry with a fresh read")]
    MergeConflict { symbol: String },

    #[error("no local data for symbol '{symbol}'")]
    NoLocalData { symbol: String },

    #[error("symbol '{symbol}' has no obtainable data for the requested range")]
    NotAvailable { symbol: String },
}

/// Trait for remote daily-bar providers.
pub trait QuoteProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars for a symbol over an inclusive date range.
    ///
    /// Returned bars are ordered ascending by date. A partial or empty
    /// response for a valid symbol is not an error; callers decide what
    /// coverage is acceptable.
    fn fetch(&self, symbol: &Symbol, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<Bar>, DataError>;

    /// Whether the provider is currently usable (not rate-limited or blocked).
    fn is_available(&self) -> bool;
}

/// Progress callback for multi-symbol operations.
pub trait DownloadProgress: Send {
    fn on_start(&self, symbol: &Symbol, index: usize, total: usize);

    fn on_complete(&self, symbol: &Symbol, index: usize, total: usize, result: &Result<(), DataError>);

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that prints to stdout.
pub struct StdoutProgress;

impl DownloadProgress for StdoutProgress {
    fn on_start(&self, symbol: &Symbol, index: usize, total: usize) {
        println!("({}/{total}) {symbol}: fetching daily bars", index + 1);
    }

    fn on_complete(
        &self,
        symbol: &Symbol,
        _index: usize,
        _total: usize,
        result: &Result<(), DataError>,
    ) {
        match result {
            Ok(()) => println!("  {symbol} series up to date"),
            Err(e) => println!("  {symbol} failed: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        println!("\n{succeeded} of {total} symbols cached, {failed} failed");
    }
}
