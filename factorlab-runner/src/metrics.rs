//! Summary metrics over closed orders and the equity curve.

use factorlab_core::domain::{Order, OrderStatus};
use factorlab_core::engine::EquityPoint;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub initial_capital: f64,
    pub final_equity: f64,
    /// Total return as a fraction of initial capital.
    pub total_return: f64,
    /// Benchmark return over the same window, if a benchmark was set.
    pub benchmark_return: Option<f64>,
    /// Largest peak-to-trough equity drawdown as a fraction.
    pub max_drawdown: f64,
    pub order_count: usize,
    pub closed_count: usize,
    pub rejected_count: usize,
    /// Fraction of closed orders with positive realized profit.
    pub win_rate: f64,
    /// Gross profit over gross loss across closed orders.
    pub profit_factor: f64,
    pub total_commission: f64,
}

impl RunSummary {
    pub fn compute(
        equity_curve: &[EquityPoint],
        orders: &[Order],
        initial_capital: f64,
        benchmark_return: Option<f64>,
    ) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);
        let total_return = final_equity / initial_capital - 1.0;

        let closed: Vec<&Order> = orders
            .iter()
            .filter(|o| o.status == OrderStatus::Closed)
            .collect();
        let rejected_count = orders
            .iter()
            .filter(|o| o.status == OrderStatus::Rejected)
            .count();
        let wins = closed.iter().filter(|o| o.realized_profit > 0.0).count();
        let win_rate = if closed.is_empty() {
            0.0
        } else {
            wins as f64 / closed.len() as f64
        };

        let gross_profit: f64 = closed
            .iter()
            .map(|o| o.realized_profit.max(0.0))
            .sum();
        let gross_loss: f64 = closed
            .iter()
            .map(|o| (-o.realized_profit).max(0.0))
            .sum();
        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        Self {
            initial_capital,
            final_equity,
            total_return,
            benchmark_return,
            max_drawdown: max_drawdown(equity_curve),
            order_count: orders.len(),
            closed_count: closed.len(),
            rejected_count,
            win_rate,
            profit_factor,
            total_commission: orders.iter().map(|o| o.commission).sum(),
        }
    }
}

/// Largest peak-to-trough drawdown as a fraction of the peak.
fn max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0f64;
    for point in equity_curve {
        peak = peak.max(point.equity);
        if peak > 0.0 {
            worst = worst.max((peak - point.equity) / peak);
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use factorlab_core::domain::SellReason;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, day).unwrap()
    }

    fn point(day: u32, equity: f64) -> EquityPoint {
        EquityPoint {
            date: d(day),
            equity,
            cash: equity,
        }
    }

    fn closed_order(profit: f64) -> Order {
        let mut order = Order::pending("sh600036".parse().unwrap(), d(2), 100.0, 100, "breakout");
        order.close(d(10), 100.0 + profit / 100.0, SellReason::EndOfData, 6);
        order
    }

    #[test]
    fn drawdown_of_monotone_curve_is_zero() {
        let curve = vec![point(1, 100.0), point(2, 110.0), point(3, 120.0)];
        assert_eq!(max_drawdown(&curve), 0.0);
    }

    #[test]
    fn drawdown_measures_peak_to_trough() {
        let curve = vec![point(1, 100.0), point(2, 120.0), point(3, 90.0), point(4, 110.0)];
        // (120 - 90) / 120 = 0.25
        assert!((max_drawdown(&curve) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn summary_counts_and_rates() {
        let curve = vec![point(1, 100_000.0), point(2, 103_000.0)];
        let orders = vec![closed_order(500.0), closed_order(-200.0)];
        let summary = RunSummary::compute(&curve, &orders, 100_000.0, Some(0.01));

        assert_eq!(summary.order_count, 2);
        assert_eq!(summary.closed_count, 2);
        assert!((summary.win_rate - 0.5).abs() < 1e-12);
        assert!((summary.total_return - 0.03).abs() < 1e-12);
        assert!((summary.profit_factor - 2.5).abs() < 1e-12);
        assert_eq!(summary.benchmark_return, Some(0.01));
    }

    #[test]
    fn empty_run_is_flat() {
        let summary = RunSummary::compute(&[], &[], 50_000.0, None);
        assert_eq!(summary.final_equity, 50_000.0);
        assert_eq!(summary.total_return, 0.0);
        assert_eq!(summary.win_rate, 0.0);
    }
}
