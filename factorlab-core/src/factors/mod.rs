//! Factors — pluggable buy and sell rules evaluated against daily data.
//!
//! Buy factors examine "today" plus a trailing lookback window and may
//! emit a pending buy; sell factors examine a held position plus today
//! and may emit a close. Factor templates are built once per simulation
//! configuration and cloned per symbol, so per-symbol mutable state
//! (counters, watermarks) lives in the clone and never leaks across
//! symbols.
//!
//! Evaluation order: buy factors are tried in configured order and the
//! first signal wins for that day. All sell factors attached to an open
//! position are evaluated each day; the first to fire (registration
//! order) closes the position. A factor error never aborts the symbol —
//! it is collected for the action log and treated as no-signal.

pub mod buy;
pub mod factory;
pub mod sell;

use crate::domain::Bar;
use thiserror::Error;

pub use factory::{create_buy_factor, create_sell_factor, FactorConfig, FactoryError};

/// Error from evaluating a single factor on a single day.
#[derive(Debug, Error)]
#[error("factor '{factor}' failed: {message}")]
pub struct FactorError {
    pub factor: String,
    pub message: String,
}

impl FactorError {
    pub fn new(factor: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            factor: factor.into(),
            message: message.into(),
        }
    }
}

/// A fired buy signal; the fill is attempted on the next trading day.
#[derive(Debug, Clone)]
pub struct BuySignal {
    pub factor: String,
}

/// A fired sell signal; the position closes the same day.
#[derive(Debug, Clone)]
pub struct SellSignal {
    pub factor: String,
}

/// The open position a sell factor evaluates against.
#[derive(Debug, Clone)]
pub struct Holding {
    /// Index of the fill bar within the series the engine iterates.
    pub buy_idx: usize,
    pub buy_price: f64,
    pub qty: u64,
    /// Trading days since the fill, maintained by the engine.
    pub days_held: u32,
}

/// A buy-signal evaluator.
///
/// `evaluate` may only use `bars[0..=idx]`. Implementations take `&mut
/// self` so per-symbol counters are possible; cross-symbol sharing is
/// prevented by cloning the chain per symbol.
pub trait BuyFactor: Send + Sync {
    fn name(&self) -> &str;

    /// Bars required before the factor can produce output.
    fn lookback(&self) -> usize;

    /// When true, the factor is disabled while a position it opened is
    /// still held (one open position per factor at a time).
    fn exclusive(&self) -> bool {
        false
    }

    fn evaluate(&mut self, bars: &[Bar], idx: usize) -> Result<Option<BuySignal>, FactorError>;

    fn clone_box(&self) -> Box<dyn BuyFactor>;
}

/// A sell-signal evaluator for an open position.
pub trait SellFactor: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(
        &mut self,
        bars: &[Bar],
        idx: usize,
        holding: &Holding,
    ) -> Result<Option<SellSignal>, FactorError>;

    fn clone_box(&self) -> Box<dyn SellFactor>;
}

impl Clone for Box<dyn BuyFactor> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl Clone for Box<dyn SellFactor> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Outcome of one day's buy evaluation.
pub struct BuyEvaluation {
    /// Winning factor index and its signal, if any factor fired.
    pub signal: Option<(usize, BuySignal)>,
    /// Per-factor errors collected along the way (treated as no-signal).
    pub errors: Vec<FactorError>,
}

/// Outcome of one day's sell evaluation.
pub struct SellEvaluation {
    pub signal: Option<SellSignal>,
    pub errors: Vec<FactorError>,
}

/// Ordered buy factors plus the set of concurrently-active sell factors.
#[derive(Clone)]
pub struct FactorChain {
    buy: Vec<Box<dyn BuyFactor>>,
    sell: Vec<Box<dyn SellFactor>>,
    /// Per-factor disable flags (exclusive factors with an open position).
    buy_disabled: Vec<bool>,
}

impl FactorChain {
    pub fn new(buy: Vec<Box<dyn BuyFactor>>, sell: Vec<Box<dyn SellFactor>>) -> Self {
        let buy_disabled = vec![false; buy.len()];
        Self {
            buy,
            sell,
            buy_disabled,
        }
    }

    /// Largest lookback any buy factor requires.
    pub fn max_lookback(&self) -> usize {
        self.buy.iter().map(|f| f.lookback()).max().unwrap_or(0)
    }

    /// Try buy factors in order; the first signal wins for the day.
    pub fn evaluate_buy(&mut self, bars: &[Bar], idx: usize) -> BuyEvaluation {
        let mut errors = Vec::new();
        for (i, factor) in self.buy.iter_mut().enumerate() {
            if self.buy_disabled[i] || idx < factor.lookback() {
                continue;
            }
            match factor.evaluate(bars, idx) {
                Ok(Some(signal)) => {
                    return BuyEvaluation {
                        signal: Some((i, signal)),
                        errors,
                    }
                }
                Ok(None) => {}
                Err(e) => errors.push(e),
            }
        }
        BuyEvaluation {
            signal: None,
            errors,
        }
    }

    /// Evaluate every sell factor; the first to fire wins (registration order).
    pub fn evaluate_sell(&mut self, bars: &[Bar], idx: usize, holding: &Holding) -> SellEvaluation {
        let mut errors = Vec::new();
        for factor in self.sell.iter_mut() {
            match factor.evaluate(bars, idx, holding) {
                Ok(Some(signal)) => {
                    return SellEvaluation {
                        signal: Some(signal),
                        errors,
                    }
                }
                Ok(None) => {}
                Err(e) => errors.push(e),
            }
        }
        SellEvaluation {
            signal: None,
            errors,
        }
    }

    /// Disable an exclusive factor while its position is open.
    pub fn note_position_opened(&mut self, factor_idx: usize) {
        if self.buy[factor_idx].exclusive() {
            self.buy_disabled[factor_idx] = true;
        }
    }

    /// Re-enable the factor once its position closes.
    pub fn note_position_closed(&mut self, factor_idx: usize) {
        self.buy_disabled[factor_idx] = false;
    }
}
