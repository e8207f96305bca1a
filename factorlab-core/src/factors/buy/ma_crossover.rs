//! Moving-average crossover buy rule.
//!
//! Fires on the day the fast SMA of closes crosses above the slow SMA.

use crate::domain::Bar;
use crate::factors::{BuyFactor, BuySignal, FactorError};

#[derive(Debug, Clone)]
pub struct MaCrossoverBuy {
    fast: usize,
    slow: usize,
    name: String,
}

impl MaCrossoverBuy {
    pub fn new(fast: usize, slow: usize) -> Self {
        assert!(fast > 0 && slow > fast, "require 0 < fast < slow");
        Self {
            fast,
            slow,
            name: format!("ma_cross_{fast}_{slow}"),
        }
    }

    /// SMA of closes over the `period` bars ending at `idx` (inclusive).
    fn sma(bars: &[Bar], idx: usize, period: usize) -> f64 {
        let window = &bars[idx + 1 - period..=idx];
        window.iter().map(|b| b.close).sum::<f64>() / period as f64
    }
}

impl BuyFactor for MaCrossoverBuy {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        // One extra bar to see the pre-cross state.
        self.slow + 1
    }

    fn evaluate(&mut self, bars: &[Bar], idx: usize) -> Result<Option<BuySignal>, FactorError> {
        if idx < self.lookback() {
            return Ok(None);
        }

        let fast_today = Self::sma(bars, idx, self.fast);
        let slow_today = Self::sma(bars, idx, self.slow);
        let fast_prev = Self::sma(bars, idx - 1, self.fast);
        let slow_prev = Self::sma(bars, idx - 1, self.slow);

        if fast_prev <= slow_prev && fast_today > slow_today {
            Ok(Some(BuySignal {
                factor: self.name.clone(),
            }))
        } else {
            Ok(None)
        }
    }

    fn clone_box(&self) -> Box<dyn BuyFactor> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64),
                open: close,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 1000,
                amount: close * 1000.0,
                prev_close: close,
                pct_change: 0.0,
            })
            .collect()
    }

    #[test]
    fn fires_on_golden_cross() {
        // Flat then a sharp rally: fast(2) crosses above slow(4).
        let closes = [10.0, 10.0, 10.0, 10.0, 10.0, 9.0, 14.0, 16.0];
        let bars = bars_from_closes(&closes);
        let mut factor = MaCrossoverBuy::new(2, 4);

        let fired: Vec<usize> = (0..bars.len())
            .filter(|&i| factor.evaluate(&bars, i).unwrap().is_some())
            .collect();
        assert_eq!(fired, vec![6]);
    }

    #[test]
    fn silent_when_already_above() {
        // Monotone rally: fast stays above slow, no fresh cross after warmup.
        let closes = [10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0, 17.0];
        let bars = bars_from_closes(&closes);
        let mut factor = MaCrossoverBuy::new(2, 4);

        for i in 5..bars.len() {
            assert!(factor.evaluate(&bars, i).unwrap().is_none(), "fired at {i}");
        }
    }
}
