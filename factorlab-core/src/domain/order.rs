//! Order — the lifecycle record of one buy/sell round trip.

use super::symbol::Symbol;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an open position was closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SellReason {
    /// A sell factor fired; carries the factor name.
    Factor(String),
    /// The hold-duration ceiling was reached.
    MaxKeepDays,
    /// The series ran out of bars while the position was open.
    EndOfData,
}

impl fmt::Display for SellReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SellReason::Factor(name) => write!(f, "factor:{name}"),
            SellReason::MaxKeepDays => write!(f, "max-keep-days"),
            SellReason::EndOfData => write!(f, "end-of-data"),
        }
    }
}

/// Order lifecycle states.
///
/// `Pending` orders await ledger confirmation of the fill; `Closed` and
/// `Rejected` are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Open,
    Closed,
    /// The ledger refused the buy (stale cash snapshot at the worker).
    Rejected,
}

/// One buy/sell round trip for a symbol.
///
/// Immutable once `Closed` except for the audit fields the ledger replay
/// fills in (`commission`, `realized_profit`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub symbol: Symbol,
    pub buy_date: NaiveDate,
    pub buy_price: f64,
    pub buy_qty: u64,
    pub buy_factor: String,
    pub sell_date: Option<NaiveDate>,
    pub sell_price: Option<f64>,
    pub sell_reason: Option<SellReason>,
    /// Trading days held, filled in on close.
    pub keep_days: u32,
    /// Total commission across both legs.
    pub commission: f64,
    pub realized_profit: f64,
    pub status: OrderStatus,
}

impl Order {
    pub fn pending(symbol: Symbol, buy_date: NaiveDate, buy_price: f64, buy_qty: u64, buy_factor: impl Into<String>) -> Self {
        Self {
            symbol,
            buy_date,
            buy_price,
            buy_qty,
            buy_factor: buy_factor.into(),
            sell_date: None,
            sell_price: None,
            sell_reason: None,
            keep_days: 0,
            commission: 0.0,
            realized_profit: 0.0,
            status: OrderStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, OrderStatus::Closed | OrderStatus::Rejected)
    }

    /// Close the order, computing realized profit net of commission.
    pub fn close(&mut self, sell_date: NaiveDate, sell_price: f64, reason: SellReason, keep_days: u32) {
        self.sell_date = Some(sell_date);
        self.sell_price = Some(sell_price);
        self.sell_reason = Some(reason);
        self.keep_days = keep_days;
        self.realized_profit =
            (sell_price - self.buy_price) * self.buy_qty as f64 - self.commission;
        self.status = OrderStatus::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn close_computes_profit_net_of_commission() {
        let mut order = Order::pending("sh600036".parse().unwrap(), d(2020, 3, 2), 30.0, 1000, "breakout_60");
        order.commission = 40.0;
        order.close(d(2020, 3, 20), 33.0, SellReason::Factor("percent_stop".into()), 14);

        assert_eq!(order.status, OrderStatus::Closed);
        assert!(order.is_terminal());
        // (33 - 30) * 1000 - 40 = 2960
        assert!((order.realized_profit - 2960.0).abs() < 1e-9);
        assert_eq!(order.keep_days, 14);
    }

    #[test]
    fn sell_reason_display() {
        assert_eq!(SellReason::EndOfData.to_string(), "end-of-data");
        assert_eq!(SellReason::MaxKeepDays.to_string(), "max-keep-days");
        assert_eq!(SellReason::Factor("trailing".into()).to_string(), "factor:trailing");
    }

    #[test]
    fn order_serialization_roundtrip() {
        let order = Order::pending("usAAPL".parse().unwrap(), d(2021, 6, 1), 130.0, 50, "ma_cross");
        let json = serde_json::to_string(&order).unwrap();
        let deser: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(deser.status, OrderStatus::Pending);
        assert_eq!(deser.buy_qty, 50);
        assert_eq!(deser.buy_factor, "ma_cross");
    }
}
