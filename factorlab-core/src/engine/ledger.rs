//! CapitalLedger — the single shared cash/position/commission ledger.
//!
//! One instance exists per simulation run. All mutation goes through
//! `apply_buy`/`apply_sell`, which re-validate atomically: workers size
//! orders against a cash snapshot that may be stale by the time their
//! transitions are replayed, so the ledger is the last word. Cash never
//! goes negative, and a sell can never reduce a position below zero.

use super::commission::{CommissionEntry, CommissionModel, TradeSide};
use crate::domain::Symbol;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Ledger mutation failures.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The buy would drive cash negative; the order is rejected, the run
    /// continues.
    #[error("insufficient funds: need {needed:.2}, have {available:.2}")]
    InsufficientFunds { needed: f64, available: f64 },

    /// A sell for more shares than held — a ledger invariant violation,
    /// fatal to the run.
    #[error("position underflow for {symbol}: selling {qty}, holding {held}")]
    PositionUnderflow {
        symbol: String,
        qty: u64,
        held: u64,
    },
}

/// One equity-curve point, marked to market after a day's orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
    pub cash: f64,
}

#[derive(Debug, Clone)]
pub struct CapitalLedger {
    pub cash: f64,
    pub initial_capital: f64,
    pub positions: BTreeMap<Symbol, u64>,
    pub commission_log: Vec<CommissionEntry>,
    pub equity_curve: Vec<EquityPoint>,
    commission: CommissionModel,
    /// Last seen price per symbol, carried forward for mark-to-market on
    /// days a symbol did not trade.
    last_prices: HashMap<Symbol, f64>,
}

impl CapitalLedger {
    pub fn new(initial_capital: f64, commission: CommissionModel) -> Self {
        Self {
            cash: initial_capital,
            initial_capital,
            positions: BTreeMap::new(),
            commission_log: Vec::new(),
            equity_curve: Vec::new(),
            commission,
            last_prices: HashMap::new(),
        }
    }

    /// Debit a buy: notional plus commission.
    ///
    /// Fails without mutating anything if cash would go negative.
    /// Returns the commission charged.
    pub fn apply_buy(
        &mut self,
        symbol: &Symbol,
        qty: u64,
        price: f64,
        date: NaiveDate,
    ) -> Result<f64, LedgerError> {
        let notional = qty as f64 * price;
        let fee = self.commission.compute(TradeSide::Buy, qty, price);
        let needed = notional + fee;
        if needed > self.cash {
            return Err(LedgerError::InsufficientFunds {
                needed,
                available: self.cash,
            });
        }

        self.cash -= needed;
        *self.positions.entry(symbol.clone()).or_insert(0) += qty;
        self.last_prices.insert(symbol.clone(), price);
        self.commission_log.push(CommissionEntry {
            symbol: symbol.clone(),
            date,
            side: TradeSide::Buy,
            notional,
            fee,
        });
        Ok(fee)
    }

    /// Credit a sell: notional minus commission; removes the position.
    ///
    /// Returns the commission charged.
    pub fn apply_sell(
        &mut self,
        symbol: &Symbol,
        qty: u64,
        price: f64,
        date: NaiveDate,
    ) -> Result<f64, LedgerError> {
        let held = self.positions.get(symbol).copied().unwrap_or(0);
        if qty > held {
            return Err(LedgerError::PositionUnderflow {
                symbol: symbol.to_string(),
                qty,
                held,
            });
        }

        let notional = qty as f64 * price;
        let fee = self.commission.compute(TradeSide::Sell, qty, price);
        self.cash += notional - fee;
        let remaining = held - qty;
        if remaining == 0 {
            self.positions.remove(symbol);
        } else {
            self.positions.insert(symbol.clone(), remaining);
        }
        self.last_prices.insert(symbol.clone(), price);
        self.commission_log.push(CommissionEntry {
            symbol: symbol.clone(),
            date,
            side: TradeSide::Sell,
            notional,
            fee,
        });
        Ok(fee)
    }

    /// Whether a position exists for the symbol.
    pub fn has_position(&self, symbol: &Symbol) -> bool {
        self.positions.get(symbol).copied().unwrap_or(0) > 0
    }

    /// Equity = cash + Σ position × price. Prices missing from `prices`
    /// fall back to the last fill/mark price seen for that symbol.
    pub fn equity(&self, prices: &HashMap<Symbol, f64>) -> f64 {
        let position_value: f64 = self
            .positions
            .iter()
            .map(|(sym, qty)| {
                let price = prices
                    .get(sym)
                    .or_else(|| self.last_prices.get(sym))
                    .copied()
                    .unwrap_or(0.0);
                *qty as f64 * price
            })
            .sum();
        self.cash + position_value
    }

    /// Recompute and record equity for one simulated day, after all of
    /// that day's orders were applied.
    pub fn mark_to_market(&mut self, date: NaiveDate, prices: &HashMap<Symbol, f64>) {
        for (sym, price) in prices {
            self.last_prices.insert(sym.clone(), *price);
        }
        let equity = self.equity(prices);
        self.equity_curve.push(EquityPoint {
            date,
            equity,
            cash: self.cash,
        });
    }

    pub fn total_commission(&self) -> f64 {
        self.commission_log.iter().map(|e| e.fee).sum()
    }
}
