//! Synthetic bar generator — seeded random walk for tests, benches, and
//! offline runs.
//!
//! Weekends are skipped so synthetic calendars look like trading
//! calendars. The same seed always produces the same series.

use crate::domain::{Bar, Symbol};
use crate::data::provider::{DataError, QuoteProvider};
use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generate a synthetic daily series between two dates (inclusive).
pub fn generate_bars(seed: u64, start: NaiveDate, end: NaiveDate, base_price: f64) -> Vec<Bar> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut bars = Vec::new();
    let mut prev_close = base_price;
    let mut date = start;

    while date <= end {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            // Daily return in roughly ±3%, mild upward drift.
            let ret: f64 = rng.gen_range(-0.03..0.0305);
            let close = (prev_close * (1.0 + ret)).max(0.01);
            let open = prev_close * (1.0 + rng.gen_range(-0.01..0.01));
            let high = close.max(open) * (1.0 + rng.gen_range(0.0..0.01));
            let low = close.min(open) * (1.0 - rng.gen_range(0.0..0.01));
            let volume = rng.gen_range(100_000..5_000_000);
            let pct_change = if prev_close > 0.0 {
                (close / prev_close - 1.0) * 100.0
            } else {
                0.0
            };
            bars.push(Bar {
                date,
                open,
                high,
                low,
                close,
                volume,
                amount: close * volume as f64,
                prev_close,
                pct_change,
            });
            prev_close = close;
        }
        date += chrono::Duration::days(1);
    }

    bars
}

/// Provider over the synthetic generator, seeded per symbol so every
/// symbol gets a distinct but reproducible walk.
pub struct SyntheticProvider {
    seed: u64,
    base_price: f64,
}

impl SyntheticProvider {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            base_price: 100.0,
        }
    }

    fn symbol_seed(&self, symbol: &Symbol) -> u64 {
        let hash = blake3::hash(symbol.to_string().as_bytes());
        let mut first = [0u8; 8];
        first.copy_from_slice(&hash.as_bytes()[..8]);
        self.seed ^ u64::from_le_bytes(first)
    }
}

impl QuoteProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, DataError> {
        Ok(generate_bars(self.symbol_seed(symbol), start, end, self.base_price))
    }

    fn is_available(&self) -> bool {
        true
    }
}
