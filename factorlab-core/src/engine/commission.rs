//! Commission model — proportional brokerage with a minimum floor, plus
//! a proportional transaction tax on the sell side.

use crate::domain::Symbol;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which leg of an order a fee belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

/// One commission-log entry, recorded per order leg.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionEntry {
    pub symbol: Symbol,
    pub date: NaiveDate,
    pub side: TradeSide,
    pub notional: f64,
    pub fee: f64,
}

/// Fee model applied to trade notional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionModel {
    /// Proportional brokerage rate per leg.
    pub fee_rate: f64,
    /// Floor on the brokerage component, per leg.
    pub min_fee: f64,
    /// Proportional transaction tax, sell side only.
    pub tax_rate: f64,
}

impl CommissionModel {
    pub fn new(fee_rate: f64, min_fee: f64, tax_rate: f64) -> Self {
        Self {
            fee_rate,
            min_fee,
            tax_rate,
        }
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Total fee for one leg of `qty` shares at `price`.
    pub fn compute(&self, side: TradeSide, qty: u64, price: f64) -> f64 {
        let notional = qty as f64 * price;
        let brokerage = (notional * self.fee_rate).max(self.min_fee);
        match side {
            TradeSide::Buy => brokerage,
            TradeSide::Sell => brokerage + notional * self.tax_rate,
        }
    }
}

impl Default for CommissionModel {
    /// 2.5 bps brokerage with a 5.0 floor, 10 bps sell-side tax.
    fn default() -> Self {
        Self::new(0.00025, 5.0, 0.001)
    }
}
