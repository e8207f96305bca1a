//! Action — the append-only audit log of what happened (or didn't) each
//! day per symbol.
//!
//! Every skipped or rejected event is narrated here: nothing in the
//! pipeline is silently dropped.

use super::symbol::Symbol;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Buy,
    Sell,
    Skip,
}

/// One immutable audit line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub date: NaiveDate,
    pub symbol: Symbol,
    pub kind: ActionKind,
    /// Price the action refers to, when one exists (fills, rejected fills).
    pub price: Option<f64>,
    pub reason: String,
}

impl Action {
    pub fn buy(date: NaiveDate, symbol: Symbol, price: f64, reason: impl Into<String>) -> Self {
        Self {
            date,
            symbol,
            kind: ActionKind::Buy,
            price: Some(price),
            reason: reason.into(),
        }
    }

    pub fn sell(date: NaiveDate, symbol: Symbol, price: f64, reason: impl Into<String>) -> Self {
        Self {
            date,
            symbol,
            kind: ActionKind::Sell,
            price: Some(price),
            reason: reason.into(),
        }
    }

    pub fn skip(date: NaiveDate, symbol: Symbol, price: Option<f64>, reason: impl Into<String>) -> Self {
        Self {
            date,
            symbol,
            kind: ActionKind::Skip,
            price,
            reason: reason.into(),
        }
    }
}
