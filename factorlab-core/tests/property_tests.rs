//! Property tests for series-merge and ledger invariants.
//!
//! Uses proptest to verify:
//! 1. Merge idempotence — merging the same fetched range twice equals once
//! 2. Coverage invariant — bounds bracket every stored bar after any merge
//! 3. No negative cash — the ledger never goes below zero
//! 4. Sizing — never exceeds the budget, always whole lots

use chrono::NaiveDate;
use proptest::prelude::*;

use factorlab_core::domain::{Bar, PriceSeries, Symbol};
use factorlab_core::engine::{CapitalLedger, CommissionModel, LedgerError, PositionSizer};

fn sym() -> Symbol {
    "sh600036".parse().unwrap()
}

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

fn bar_at(offset: i64, close: f64) -> Bar {
    Bar {
        date: base_date() + chrono::Duration::days(offset),
        open: close,
        high: close + 1.0,
        low: (close - 1.0).max(0.01),
        close,
        volume: 1000,
        amount: close * 1000.0,
        prev_close: close,
        pct_change: 0.0,
    }
}

fn bars_over(start_offset: i64, len: i64, price_tag: f64) -> Vec<Bar> {
    (0..len)
        .map(|i| bar_at(start_offset + i, 100.0 + price_tag + i as f64))
        .collect()
}

// ── 1 + 2. Merge idempotence and coverage invariant ──────────────────

proptest! {
    /// Merging the same fetched range twice yields an identical series to
    /// merging it once.
    #[test]
    fn merge_is_idempotent(
        local_len in 1i64..60,
        fetch_start in 0i64..90,
        fetch_len in 1i64..60,
    ) {
        let fetched = bars_over(fetch_start, fetch_len, 500.0);
        let f_start = base_date() + chrono::Duration::days(fetch_start);
        let f_end = base_date() + chrono::Duration::days(fetch_start + fetch_len - 1);

        let mut once = PriceSeries::new(
            sym(),
            bars_over(0, local_len, 0.0),
            base_date(),
            base_date() + chrono::Duration::days(local_len - 1),
        );
        let mut twice = once.clone();

        once.merge(fetched.clone(), f_start, f_end);
        twice.merge(fetched.clone(), f_start, f_end);
        twice.merge(fetched, f_start, f_end);

        prop_assert_eq!(once.len(), twice.len());
        prop_assert_eq!(once.covered_start, twice.covered_start);
        prop_assert_eq!(once.covered_end, twice.covered_end);
        for (a, b) in once.bars.iter().zip(twice.bars.iter()) {
            prop_assert_eq!(a.date, b.date);
            prop_assert_eq!(a.close, b.close);
        }
    }

    /// After any sequence of merges, dates are unique ascending and the
    /// coverage bounds bracket every stored bar. Fetched values win on
    /// overlap.
    #[test]
    fn merge_preserves_invariants(
        local_len in 1i64..40,
        merges in prop::collection::vec((0i64..80, 1i64..40), 1..5),
    ) {
        let mut series = PriceSeries::new(
            sym(),
            bars_over(0, local_len, 0.0),
            base_date(),
            base_date() + chrono::Duration::days(local_len - 1),
        );

        for (i, (start_off, len)) in merges.iter().enumerate() {
            let fetched = bars_over(*start_off, *len, 1000.0 * (i + 1) as f64);
            let f_start = base_date() + chrono::Duration::days(*start_off);
            let f_end = base_date() + chrono::Duration::days(start_off + len - 1);
            series.merge(fetched, f_start, f_end);

            prop_assert!(series.invariants_hold());
        }

        // The last merge's values survive inside its own range.
        let (last_start, last_len) = merges[merges.len() - 1];
        let tag = 1000.0 * merges.len() as f64;
        for bar in &series.bars {
            let offset = (bar.date - base_date()).num_days();
            if offset >= last_start && offset < last_start + last_len {
                prop_assert!((bar.close - (100.0 + tag + (offset - last_start) as f64)).abs() < 1e-9);
            }
        }
    }
}

// ── 3. No negative cash ──────────────────────────────────────────────

proptest! {
    /// For any sequence of attempted buys and sells, cash never goes
    /// negative: over-budget buys are rejected atomically, oversells are
    /// refused as corruption.
    #[test]
    fn cash_never_negative(
        ops in prop::collection::vec(
            (prop::bool::ANY, 1u64..50, 1.0f64..200.0),
            1..40,
        ),
    ) {
        let mut ledger = CapitalLedger::new(10_000.0, CommissionModel::default());
        let symbol = sym();
        let date = base_date();
        let mut held = 0u64;

        for (is_buy, lots, price) in ops {
            let qty = lots * 100;
            if is_buy {
                match ledger.apply_buy(&symbol, qty, price, date) {
                    Ok(_) => held += qty,
                    Err(LedgerError::InsufficientFunds { .. }) => {}
                    Err(e) => prop_assert!(false, "unexpected: {e}"),
                }
            } else {
                match ledger.apply_sell(&symbol, qty, price, date) {
                    Ok(_) => held -= qty,
                    Err(LedgerError::PositionUnderflow { .. }) => {
                        prop_assert!(qty > held);
                    }
                    Err(e) => prop_assert!(false, "unexpected: {e}"),
                }
            }
            prop_assert!(ledger.cash >= 0.0, "cash went negative: {}", ledger.cash);
        }
    }
}

// ── 4. Sizing ────────────────────────────────────────────────────────

proptest! {
    /// Sized orders never exceed the committed budget and are always a
    /// whole number of lots.
    #[test]
    fn sizer_respects_budget_and_lots(
        cash in 0.0f64..1_000_000.0,
        price in 0.01f64..500.0,
        pct in 0.01f64..1.0,
    ) {
        let sizer = PositionSizer::new(pct);
        let symbol = sym();
        let qty = sizer.size(&symbol, cash, price);

        prop_assert_eq!(qty % symbol.min_lot(), 0);
        prop_assert!(qty as f64 * price <= cash * pct + 1e-6);
    }
}
