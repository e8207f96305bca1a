//! Bar — one trading day's market data for a symbol.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar plus the derived fields the factor layer consumes.
///
/// `amount` is the traded currency value, `prev_close` the prior session's
/// close, `pct_change` the close-over-prev-close change in percent.
/// Bars are immutable once stored and ordered ascending by date within a
/// series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub amount: f64,
    pub prev_close: f64,
    pub pct_change: f64,
}

impl Bar {
    /// Basic OHLC sanity check: high brackets open/close/low, prices positive.
    pub fn is_sane(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }

    /// Open-over-previous-close gap, as a signed fraction.
    ///
    /// Negative means the session opened below the prior close. Returns 0.0
    /// when `prev_close` is not positive (first bar of a listing).
    pub fn open_gap(&self) -> f64 {
        if self.prev_close > 0.0 {
            self.open / self.prev_close - 1.0
        } else {
            0.0
        }
    }
}
