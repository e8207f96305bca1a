//! Fixed-percent exit — stop-loss below entry, take-profit above.

use crate::domain::Bar;
use crate::factors::{FactorError, Holding, SellFactor, SellSignal};

#[derive(Debug, Clone)]
pub struct PercentStopSell {
    /// Loss fraction that triggers the stop (e.g. 0.08).
    stop_loss_pct: f64,
    /// Gain fraction that takes profit (e.g. 0.20).
    take_profit_pct: f64,
    name: String,
}

impl PercentStopSell {
    pub fn new(stop_loss_pct: f64, take_profit_pct: f64) -> Self {
        assert!(stop_loss_pct > 0.0 && stop_loss_pct < 1.0);
        assert!(take_profit_pct > 0.0);
        Self {
            stop_loss_pct,
            take_profit_pct,
            name: "percent_stop".to_string(),
        }
    }
}

impl SellFactor for PercentStopSell {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(
        &mut self,
        bars: &[Bar],
        idx: usize,
        holding: &Holding,
    ) -> Result<Option<SellSignal>, FactorError> {
        let close = bars[idx].close;
        let stop_level = holding.buy_price * (1.0 - self.stop_loss_pct);
        let profit_level = holding.buy_price * (1.0 + self.take_profit_pct);

        if close <= stop_level || close >= profit_level {
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
