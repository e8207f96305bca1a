//! N-day-high breakout buy rule.
//!
//! Fires when today's close exceeds the highest close of the previous
//! `lookback` bars.

use crate::domain::Bar;
use crate::factors::{BuyFactor, BuySignal, FactorError};

#[derive(Debug, Clone)]
pub struct BreakoutBuy {
    lookback: usize,
    exclusive: bool,
    name: String,
}

impl BreakoutBuy {
    pub fn new(lookback: usize, exclusive: bool) -> Self {
        assert!(lookback > 0, "lookback must be positive");
        Self {
            lookback,
            exclusive,
            name: format!("breakout_{lookback}"),
        }
    }
}

impl BuyFactor for BreakoutBuy {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.lookback
    }

    fn exclusive(&self) -> bool {
        self.exclusive
    }

    fn evaluate(&mut self, bars: &[Bar], idx: usize) -> Result<Option<BuySignal>, FactorError> {
        if idx < self.lookback {
            return Ok(None);
        }
        let window = &bars[idx - self.lookback..idx];
        let window_high = window
            .iter()
            .map(|b| b.close)
            .fold(f64::MIN, f64::max);

        if bars[idx].close > window_high {
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
