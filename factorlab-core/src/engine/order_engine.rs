//! Order engine — the per-symbol order state machine.
//!
//! States: Idle → PendingBuy → Open → Closed. Each day the engine runs
//! buy evaluation (Idle), attempts the next-day fill (PendingBuy), or
//! runs sell evaluation plus the hold-duration ceiling (Open). The run
//! is read-only with respect to shared state: it sizes orders against a
//! cash snapshot and emits candidate transitions for the master to replay
//! against the single ledger.
//!
//! Failure policy: a factor error on one day is logged as a Skip action
//! and treated as no-signal; it never aborts the symbol. A symbol with
//! insufficient history is skipped before entering Idle.

use super::sizer::PositionSizer;
use super::slippage::SlippageModel;
use crate::domain::{Action, PriceSeries, SellReason, Symbol};
use crate::factors::{FactorChain, Holding};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// One candidate order transition, tagged for deterministic replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateTransition {
    pub date: NaiveDate,
    pub symbol: Symbol,
    /// Per-symbol order index linking the buy and sell legs of one order.
    pub order_idx: usize,
    /// Position of this transition within the symbol's stream.
    pub seq: usize,
    pub kind: TransitionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TransitionKind {
    Buy {
        price: f64,
        qty: u64,
        factor: String,
    },
    Sell {
        price: f64,
        reason: SellReason,
        keep_days: u32,
    },
}

/// Per-run engine parameters.
#[derive(Debug, Clone)]
pub struct EngineRunConfig {
    /// Cash snapshot workers size against; the ledger re-validates on apply.
    pub cash_snapshot: f64,
    /// Hold-duration ceiling in trading days, if any.
    pub max_keep_days: Option<u32>,
}

/// Everything one symbol's run produced.
#[derive(Debug, Clone, Default)]
pub struct EngineOutcome {
    pub transitions: Vec<CandidateTransition>,
    pub actions: Vec<Action>,
}

enum State {
    Idle,
    PendingBuy {
        signal_idx: usize,
        factor_idx: usize,
        factor: String,
    },
    Open {
        factor_idx: usize,
        factor: String,
        holding: Holding,
    },
}

/// Run the state machine over one symbol's series.
///
/// Returns `None` if cancellation was observed — the caller must then
/// discard the symbol entirely so no partial stream reaches the ledger.
pub fn run_symbol(
    series: &PriceSeries,
    chain: &mut FactorChain,
    slippage: &dyn SlippageModel,
    sizer: &PositionSizer,
    config: &EngineRunConfig,
    cancel: &AtomicBool,
) -> Option<EngineOutcome> {
    let symbol = &series.symbol;
    let bars = &series.bars;
    let mut outcome = EngineOutcome::default();

    let lookback = chain.max_lookback();
    if bars.len() <= lookback {
        let date = bars.last().map(|b| b.date).unwrap_or(series.covered_end);
        outcome.actions.push(Action::skip(
            date,
            symbol.clone(),
            None,
            format!("insufficient-history: {} bars, lookback {lookback}", bars.len()),
        ));
        return Some(outcome);
    }

    let mut state = State::Idle;
    let mut next_order_idx = 0usize;
    let mut seq = 0usize;

    for idx in lookback..bars.len() {
        if cancel.load(Ordering::Relaxed) {
            return None;
        }
        let bar = &bars[idx];

        state = match state {
            State::Idle => {
                let eval = chain.evaluate_buy(bars, idx);
                for err in &eval.errors {
                    outcome.actions.push(Action::skip(
                        bar.date,
                        symbol.clone(),
                        None,
                        format!("factor-error: {err}"),
                    ));
                }
                match eval.signal {
                    Some((factor_idx, signal)) => State::PendingBuy {
                        signal_idx: idx,
                        factor_idx,
                        factor: signal.factor,
                    },
                    None => State::Idle,
                }
            }

            State::PendingBuy {
                signal_idx,
                factor_idx,
                factor,
            } => {
                if idx + 1 == bars.len() {
                    // A fill on the final bar could only be force-closed
                    // the same day; treat the signal as unfillable instead.
                    outcome.actions.push(Action::skip(
                        bar.date,
                        symbol.clone(),
                        None,
                        format!("end-of-data before fill: {factor}"),
                    ));
                    State::Idle
                } else {
                    match slippage.fill_buy(&bars[signal_idx], bar) {
                        None => {
                            outcome.actions.push(Action::skip(
                                bar.date,
                                symbol.clone(),
                                Some(bar.open),
                                format!("fill-rejected: {factor}"),
                            ));
                            State::Idle
                        }
                        Some(price) => {
                            let qty = sizer.size(symbol, config.cash_snapshot, price);
                            if qty == 0 {
                                outcome.actions.push(Action::skip(
                                    bar.date,
                                    symbol.clone(),
                                    Some(price),
                                    "insufficient-funds",
                                ));
                                State::Idle
                            } else {
                                let order_idx = next_order_idx;
                                next_order_idx += 1;
                                outcome.transitions.push(CandidateTransition {
                                    date: bar.date,
                                    symbol: symbol.clone(),
                                    order_idx,
                                    seq,
                                    kind: TransitionKind::Buy {
                                        price,
                                        qty,
                                        factor: factor.clone(),
                                    },
                                });
                                seq += 1;
                                outcome.actions.push(Action::buy(
                                    bar.date,
                                    symbol.clone(),
                                    price,
                                    factor.clone(),
                                ));
                                chain.note_position_opened(factor_idx);
                                State::Open {
                                    factor_idx,
                                    factor,
                                    holding: Holding {
                                        buy_idx: idx,
                                        buy_price: price,
                                        qty,
                                        days_held: 0,
                                    },
                                }
                            }
                        }
                    }
                }
            }

            State::Open {
                factor_idx,
                factor,
                mut holding,
            } => {
                holding.days_held += 1;

                let eval = chain.evaluate_sell(bars, idx, &holding);
                for err in &eval.errors {
                    outcome.actions.push(Action::skip(
                        bar.date,
                        symbol.clone(),
                        None,
                        format!("factor-error: {err}"),
                    ));
                }

                let reason = match eval.signal {
                    Some(signal) => Some(SellReason::Factor(signal.factor)),
                    None => match config.max_keep_days {
                        Some(ceiling) if holding.days_held >= ceiling => {
                            Some(SellReason::MaxKeepDays)
                        }
                        _ => None,
                    },
                };

                match reason {
                    Some(reason) => {
                        let price = slippage.fill_sell(bar);
                        outcome.transitions.push(CandidateTransition {
                            date: bar.date,
                            symbol: symbol.clone(),
                            order_idx: next_order_idx - 1,
                            seq,
                            kind: TransitionKind::Sell {
                                price,
                                reason: reason.clone(),
                                keep_days: holding.days_held,
                            },
                        });
                        seq += 1;
                        outcome.actions.push(Action::sell(
                            bar.date,
                            symbol.clone(),
                            price,
                            reason.to_string(),
                        ));
                        chain.note_position_closed(factor_idx);
                        State::Idle
                    }
                    None => State::Open {
                        factor_idx,
                        factor,
                        holding,
                    },
                }
            }
        };
    }

    // Series exhausted with state left over.
    match state {
        State::Idle => {}
        State::PendingBuy { factor, .. } => {
            let last = bars.last().expect("non-empty after history check");
            outcome.actions.push(Action::skip(
                last.date,
                symbol.clone(),
                None,
                format!("end-of-data before fill: {factor}"),
            ));
        }
        State::Open {
            factor_idx,
            holding,
            ..
        } => {
            // The last bar was already evaluated (and counted) in the loop;
            // the forced close happens at its price on the same date.
            let last = bars.last().expect("non-empty after history check");
            let price = last.close;
            outcome.transitions.push(CandidateTransition {
                date: last.date,
                symbol: symbol.clone(),
                order_idx: next_order_idx - 1,
                seq,
                kind: TransitionKind::Sell {
                    price,
                    reason: SellReason::EndOfData,
                    keep_days: holding.days_held,
                },
            });
            outcome.actions.push(Action::sell(
                last.date,
                symbol.clone(),
                price,
                SellReason::EndOfData.to_string(),
            ));
            chain.note_position_closed(factor_idx);
        }
    }

    Some(outcome)
}
