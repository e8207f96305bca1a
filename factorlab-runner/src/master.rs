//! SimulationMaster — fans the symbol universe out to per-symbol order
//! engine runs and serializes ledger application.
//!
//! Workers are read-only with respect to shared state: each owns a cloned
//! factor chain and reads an immutable series snapshot. The sole
//! synchronization point is the serial replay of all candidate
//! transitions against the single CapitalLedger, and sorting the
//! transitions by (date, symbol, seq) first makes the outputs independent
//! of worker scheduling order.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use rayon::prelude::*;
use thiserror::Error;

use factorlab_core::data::{DataSupplier, SupplierConfig};
use factorlab_core::domain::{Action, Order, OrderStatus, PriceSeries, Symbol};
use factorlab_core::engine::{
    run_symbol, CandidateTransition, CapitalLedger, EngineOutcome, EngineRunConfig, LedgerError,
    TransitionKind,
};
use factorlab_core::factors::FactoryError;

use crate::config::{ConfigError, SimulationConfig};
use crate::metrics::RunSummary;
use crate::result::{BenchmarkPoint, SimulationResult, SCHEMA_VERSION};

/// Errors from the master.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("factor construction error: {0}")]
    Factory(#[from] FactoryError),
    #[error("run cancelled")]
    Cancelled,
    #[error("ledger corrupted: {0}")]
    LedgerCorruption(String),
}

/// What one symbol's worker produced.
enum SymbolRun {
    Completed {
        series: PriceSeries,
        outcome: EngineOutcome,
    },
    Dropped {
        action: Action,
    },
    Cancelled,
}

pub struct SimulationMaster {
    config: SimulationConfig,
}

impl SimulationMaster {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// The supplier configuration this run expects.
    pub fn supplier_config(&self) -> SupplierConfig {
        self.config.supplier_config()
    }

    /// Run the whole simulation: parallel per-symbol engines, then serial
    /// ledger replay, then per-day mark-to-market.
    pub fn run(
        &self,
        supplier: &DataSupplier,
        cancel: &AtomicBool,
    ) -> Result<SimulationResult, RunError> {
        let universe = self.config.universe()?;
        let template = self.config.build_chain()?;
        let slippage = self.config.slippage();
        let sizer = self.config.sizer();
        let start = self.config.simulation.start;
        let end = self.config.simulation.end;
        let run_config = EngineRunConfig {
            cash_snapshot: self.config.simulation.initial_capital,
            max_keep_days: self.config.simulation.max_keep_days,
        };

        // Parallel fan-out: fetch + engine per symbol, no shared mutation.
        let runs: Vec<SymbolRun> = universe
            .par_iter()
            .map(|symbol| {
                if cancel.load(Ordering::Relaxed) {
                    return SymbolRun::Cancelled;
                }
                let series = match supplier.fetch(symbol, start, end) {
                    Ok(series) => series,
                    Err(e) => {
                        let date = end.unwrap_or_else(|| chrono::Local::now().date_naive());
                        return SymbolRun::Dropped {
                            action: Action::skip(
                                date,
                                symbol.clone(),
                                None,
                                format!("data-unavailable: {e}"),
                            ),
                        };
                    }
                };
                let mut chain = template.clone();
                match run_symbol(&series, &mut chain, &slippage, &sizer, &run_config, cancel) {
                    Some(outcome) => SymbolRun::Completed { series, outcome },
                    None => SymbolRun::Cancelled,
                }
            })
            .collect();

        if runs.iter().any(|r| matches!(r, SymbolRun::Cancelled)) {
            return Err(RunError::Cancelled);
        }

        // Gather actions, transitions, and the per-date close map.
        let mut actions: Vec<Action> = Vec::new();
        let mut transitions: Vec<CandidateTransition> = Vec::new();
        let mut closes: BTreeMap<NaiveDate, HashMap<Symbol, f64>> = BTreeMap::new();

        for run in runs {
            match run {
                SymbolRun::Completed { series, outcome } => {
                    for bar in &series.bars {
                        closes
                            .entry(bar.date)
                            .or_default()
                            .insert(series.symbol.clone(), bar.close);
                    }
                    actions.extend(outcome.actions);
                    transitions.extend(outcome.transitions);
                }
                SymbolRun::Dropped { action } => actions.push(action),
                SymbolRun::Cancelled => unreachable!("checked above"),
            }
        }

        // The determinism anchor: replay order is (date, symbol, seq),
        // regardless of how workers interleaved.
        transitions.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.symbol.cmp(&b.symbol))
                .then_with(|| a.seq.cmp(&b.seq))
        });

        let mut ledger = CapitalLedger::new(
            self.config.simulation.initial_capital,
            self.config.commission_model(),
        );
        let (orders, mut replay_actions) =
            replay_transitions(&transitions, &mut ledger, &closes)?;
        actions.append(&mut replay_actions);

        // Stable sort so each symbol's intra-day narration keeps its order.
        actions.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.symbol.cmp(&b.symbol)));

        // Benchmark-relative curve over the same calendar.
        let benchmark_curve = self.benchmark_curve(supplier, &closes);
        let benchmark_return = benchmark_return(
            &benchmark_curve,
            self.config.simulation.initial_capital,
        );

        let summary = RunSummary::compute(
            &ledger.equity_curve,
            &orders,
            self.config.simulation.initial_capital,
            benchmark_return,
        );

        let config_hash = blake3::hash(
            &serde_json::to_vec(&self.config).unwrap_or_default(),
        )
        .to_hex()
        .to_string();

        Ok(SimulationResult {
            schema_version: SCHEMA_VERSION,
            config_hash,
            orders,
            actions,
            equity_curve: ledger.equity_curve,
            benchmark_curve,
            summary,
        })
    }

    /// The benchmark symbol's series normalized to initial capital,
    /// carried forward across calendar dates it did not trade.
    fn benchmark_curve(
        &self,
        supplier: &DataSupplier,
        closes: &BTreeMap<NaiveDate, HashMap<Symbol, f64>>,
    ) -> Vec<BenchmarkPoint> {
        let benchmark = match self.config.benchmark() {
            Ok(Some(symbol)) => symbol,
            _ => return Vec::new(),
        };
        let series = match supplier.fetch(
            &benchmark,
            self.config.simulation.start,
            self.config.simulation.end,
        ) {
            Ok(series) if !series.is_empty() => series,
            Ok(_) => return Vec::new(),
            Err(e) => {
                eprintln!("WARNING: benchmark {benchmark} unavailable: {e}");
                return Vec::new();
            }
        };

        let by_date: BTreeMap<NaiveDate, f64> =
            series.bars.iter().map(|b| (b.date, b.close)).collect();
        let first_close = series.bars[0].close;
        let capital = self.config.simulation.initial_capital;

        let mut last = first_close;
        closes
            .keys()
            .map(|date| {
                if let Some(&close) = by_date.get(date) {
                    last = close;
                }
                BenchmarkPoint {
                    date: *date,
                    value: capital * last / first_close,
                }
            })
            .collect()
    }
}

/// Serial replay of the sorted transition stream against the one ledger,
/// with a mark-to-market after each simulated day's orders.
fn replay_transitions(
    transitions: &[CandidateTransition],
    ledger: &mut CapitalLedger,
    closes: &BTreeMap<NaiveDate, HashMap<Symbol, f64>>,
) -> Result<(Vec<Order>, Vec<Action>), RunError> {
    let mut orders: Vec<Order> = Vec::new();
    let mut order_slot: HashMap<(Symbol, usize), usize> = HashMap::new();
    let mut actions: Vec<Action> = Vec::new();
    let mut cursor = 0usize;

    for (date, prices) in closes {
        while cursor < transitions.len() && transitions[cursor].date == *date {
            let t = &transitions[cursor];
            cursor += 1;

            match &t.kind {
                TransitionKind::Buy { price, qty, factor } => {
                    let mut order =
                        Order::pending(t.symbol.clone(), t.date, *price, *qty, factor.clone());
                    match ledger.apply_buy(&t.symbol, *qty, *price, t.date) {
                        Ok(fee) => {
                            order.commission += fee;
                            order.status = OrderStatus::Open;
                        }
                        Err(LedgerError::InsufficientFunds { .. }) => {
                            // The worker sized against a stale snapshot;
                            // this order loses the race and is rejected.
                            order.status = OrderStatus::Rejected;
                            actions.push(Action::skip(
                                t.date,
                                t.symbol.clone(),
                                Some(*price),
                                "insufficient-funds",
                            ));
                        }
                        Err(e) => return Err(RunError::LedgerCorruption(e.to_string())),
                    }
                    order_slot.insert((t.symbol.clone(), t.order_idx), orders.len());
                    orders.push(order);
                }
                TransitionKind::Sell {
                    price,
                    reason,
                    keep_days,
                } => {
                    let slot = order_slot
                        .get(&(t.symbol.clone(), t.order_idx))
                        .copied()
                        .ok_or_else(|| {
                            RunError::LedgerCorruption(format!(
                                "sell without buy for {} order {}",
                                t.symbol, t.order_idx
                            ))
                        })?;
                    let order = &mut orders[slot];
                    match order.status {
                        // The buy leg was rejected: its sell leg is dropped.
                        OrderStatus::Rejected => {}
                        OrderStatus::Open => {
                            match ledger.apply_sell(&t.symbol, order.buy_qty, *price, t.date) {
                                Ok(fee) => {
                                    order.commission += fee;
                                    order.close(t.date, *price, reason.clone(), *keep_days);
                                }
                                Err(e) => {
                                    return Err(RunError::LedgerCorruption(e.to_string()))
                                }
                            }
                        }
                        _ => {
                            return Err(RunError::LedgerCorruption(format!(
                                "sell leg hit order in state {:?}",
                                order.status
                            )))
                        }
                    }
                }
            }
        }

        ledger.mark_to_market(*date, prices);
    }

    Ok((orders, actions))
}

fn benchmark_return(curve: &[BenchmarkPoint], initial_capital: f64) -> Option<f64> {
    curve.last().map(|p| p.value / initial_capital - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use factorlab_core::domain::SellReason;

    fn sym(raw: &str) -> Symbol {
        raw.parse().unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, day).unwrap()
    }

    fn buy(symbol: &str, day: u32, order_idx: usize, seq: usize, price: f64, qty: u64) -> CandidateTransition {
        CandidateTransition {
            date: d(day),
            symbol: sym(symbol),
            order_idx,
            seq,
            kind: TransitionKind::Buy {
                price,
                qty,
                factor: "test".into(),
            },
        }
    }

    fn sell(symbol: &str, day: u32, order_idx: usize, seq: usize, price: f64) -> CandidateTransition {
        CandidateTransition {
            date: d(day),
            symbol: sym(symbol),
            order_idx,
            seq,
            kind: TransitionKind::Sell {
                price,
                reason: SellReason::EndOfData,
                keep_days: 1,
            },
        }
    }

    fn closes_for(days: &[u32], symbol: &str, price: f64) -> BTreeMap<NaiveDate, HashMap<Symbol, f64>> {
        let mut closes = BTreeMap::new();
        for &day in days {
            closes
                .entry(d(day))
                .or_insert_with(HashMap::new)
                .insert(sym(symbol), price);
        }
        closes
    }

    #[test]
    fn replay_fills_and_closes_orders() {
        let transitions = vec![
            buy("sh600036", 2, 0, 0, 10.0, 1000),
            sell("sh600036", 3, 0, 1, 11.0),
        ];
        let mut ledger =
            CapitalLedger::new(100_000.0, factorlab_core::engine::CommissionModel::frictionless());
        let closes = closes_for(&[2, 3], "sh600036", 11.0);

        let (orders, actions) = replay_transitions(&transitions, &mut ledger, &closes).unwrap();
        assert!(actions.is_empty());
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::Closed);
        assert!((orders[0].realized_profit - 1000.0).abs() < 1e-9);
        assert_eq!(ledger.cash, 101_000.0);
        assert_eq!(ledger.equity_curve.len(), 2);
    }

    #[test]
    fn stale_snapshot_buy_is_rejected_and_its_sell_dropped() {
        // Two symbols each sized to consume nearly all cash; the second
        // buy must be rejected and its sell leg skipped.
        let transitions = vec![
            buy("sh600036", 2, 0, 0, 10.0, 9000),
            buy("sz000001", 2, 0, 0, 10.0, 9000),
            sell("sh600036", 3, 0, 1, 10.0),
            sell("sz000001", 3, 0, 1, 10.0),
        ];
        let mut sorted = transitions.clone();
        sorted.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.symbol.cmp(&b.symbol))
                .then_with(|| a.seq.cmp(&b.seq))
        });

        let mut ledger =
            CapitalLedger::new(100_000.0, factorlab_core::engine::CommissionModel::frictionless());
        let mut closes = closes_for(&[2, 3], "sh600036", 10.0);
        for (_, m) in closes.iter_mut() {
            m.insert(sym("sz000001"), 10.0);
        }

        let (orders, actions) = replay_transitions(&sorted, &mut ledger, &closes).unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].status, OrderStatus::Closed);
        assert_eq!(orders[1].status, OrderStatus::Rejected);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].reason, "insufficient-funds");
        // Cash is back to initial after the surviving round trip.
        assert_eq!(ledger.cash, 100_000.0);
    }

    #[test]
    fn sell_without_buy_is_corruption() {
        let transitions = vec![sell("sh600036", 3, 0, 0, 10.0)];
        let mut ledger =
            CapitalLedger::new(100_000.0, factorlab_core::engine::CommissionModel::frictionless());
        let closes = closes_for(&[3], "sh600036", 10.0);

        assert!(matches!(
            replay_transitions(&transitions, &mut ledger, &closes),
            Err(RunError::LedgerCorruption(_))
        ));
    }
}
