//! Slippage models — determine the realized fill price relative to a
//! signal day, and whether a fill happens at all.
//!
//! Buys fill on the trading day after the signal; a large gap-down open
//! on the fill day rejects the fill entirely (the engine returns to
//! idle). Sells fill the same day the sell signal fires.

use crate::domain::Bar;

/// Fill-price model.
pub trait SlippageModel: Send + Sync {
    /// Name of this model.
    fn name(&self) -> &str;

    /// Price at which a buy signalled on `signal_bar` fills on `fill_bar`.
    ///
    /// Returns `None` when the fill is rejected (price-gap conditions).
    fn fill_buy(&self, signal_bar: &Bar, fill_bar: &Bar) -> Option<f64>;

    /// Price at which a sell fires on `bar`.
    fn fill_sell(&self, bar: &Bar) -> f64;
}

/// Midpoint fill: buys at the fill day's (high+low)/2, sells at the close.
///
/// A fill-day open gapping down from the prior close by more than
/// `gap_down_limit` rejects the buy.
#[derive(Debug, Clone)]
pub struct MidpointSlippage {
    pub gap_down_limit: f64,
}

impl MidpointSlippage {
    pub fn new(gap_down_limit: f64) -> Self {
        assert!(gap_down_limit > 0.0, "gap_down_limit must be positive");
        Self { gap_down_limit }
    }
}

impl Default for MidpointSlippage {
    fn default() -> Self {
        Self::new(0.07)
    }
}

impl SlippageModel for MidpointSlippage {
    fn name(&self) -> &str {
        "midpoint"
    }

    fn fill_buy(&self, _signal_bar: &Bar, fill_bar: &Bar) -> Option<f64> {
        if fill_bar.open_gap() < -self.gap_down_limit {
            return None;
        }
        Some((fill_bar.high + fill_bar.low) / 2.0)
    }

    fn fill_sell(&self, bar: &Bar) -> f64 {
        bar.close
    }
}
