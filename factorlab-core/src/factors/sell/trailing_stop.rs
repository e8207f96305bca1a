//! Trailing-stop exit — give back a fixed fraction from the post-entry
//! peak close, once the position has moved into profit.
//!
//! Stateful: the factor tracks the peak itself, keyed on the holding's
//! fill index so the watermark resets for each new position. This is the
//! reason sell factors are cloned per symbol rather than shared.

use crate::domain::Bar;
use crate::factors::{FactorError, Holding, SellFactor, SellSignal};

#[derive(Debug, Clone)]
pub struct TrailingStopSell {
    /// Fraction given back from the peak that triggers the exit.
    giveback_pct: f64,
    /// Gain fraction over entry required before the trail activates.
    activation_pct: f64,
    /// Peak close since entry, for the position identified by `tracked_buy_idx`.
    peak: f64,
    tracked_buy_idx: Option<usize>,
    name: String,
}

impl TrailingStopSell {
    pub fn new(giveback_pct: f64, activation_pct: f64) -> Self {
        assert!(giveback_pct > 0.0 && giveback_pct < 1.0);
        assert!(activation_pct >= 0.0);
        Self {
            giveback_pct,
            activation_pct,
            peak: 0.0,
            tracked_buy_idx: None,
            name: "trailing_stop".to_string(),
        }
    }
}

impl SellFactor for TrailingStopSell {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(
        &mut self,
        bars: &[Bar],
        idx: usize,
        holding: &Holding,
    ) -> Result<Option<SellSignal>, FactorError> {
        // New position: reset the watermark.
        if self.tracked_buy_idx != Some(holding.buy_idx) {
            self.tracked_buy_idx = Some(holding.buy_idx);
            self.peak = holding.buy_price;
        }

        let close = bars[idx].close;
        self.peak = self.peak.max(close);

        let activated = self.peak >= holding.buy_price * (1.0 + self.activation_pct);
        if activated && close <= self.peak * (1.0 - self.giveback_pct) {
            Ok(Some(SellSignal {
                factor: self.name.clone(),
            }))
        } else {
            Ok(None)
        }
    }

    fn clone_box(&self) -> Box<dyn SellFactor> {
        Box::new(self.clone())
    }
}
