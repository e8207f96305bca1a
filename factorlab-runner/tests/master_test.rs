//! Integration tests for the simulation master.
//!
//! The determinism test is the heart: the same universe and config must
//! produce byte-identical results regardless of worker interleaving.

use chrono::NaiveDate;
use std::sync::atomic::AtomicBool;

use factorlab_core::data::synthetic::generate_bars;
use factorlab_core::data::{DataSupplier, SeriesStore};
use factorlab_core::domain::{OrderStatus, PriceSeries, Symbol};
use factorlab_runner::master::RunError;
use factorlab_runner::{SimulationConfig, SimulationMaster};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Seed a store with synthetic 2020 coverage for the given symbols.
fn seed_store(dir: &std::path::Path, symbols: &[&str]) {
    let store = SeriesStore::new(dir);
    for (i, raw) in symbols.iter().enumerate() {
        let symbol: Symbol = raw.parse().unwrap();
        let bars = generate_bars(1000 + i as u64, d(2020, 1, 1), d(2020, 12, 31), 50.0);
        let series = PriceSeries::new(symbol, bars, d(2020, 1, 1), d(2020, 12, 31));
        store.write(&series, None).unwrap();
    }
}

fn test_config(cache_dir: &std::path::Path) -> SimulationConfig {
    let toml_src = format!(
        r#"
        [simulation]
        initial_capital = 1000000.0
        position_pct = 0.3
        max_keep_days = 40
        start = "2020-01-02"
        end = "2020-12-31"
        benchmark = "sh000300"
        universe = ["sh600036", "sz000001", "sh601318", "usAAPL"]

        [[buy_factors]]
        factor_type = "breakout"
        params = {{ lookback = 20.0 }}

        [[sell_factors]]
        factor_type = "percent_stop"
        params = {{ stop_loss_pct = 0.06, take_profit_pct = 0.15 }}

        [[sell_factors]]
        factor_type = "trailing_stop"

        [data]
        cache_dir = "{}"
        fetch_mode = "local"
        "#,
        cache_dir.display()
    );
    SimulationConfig::from_toml(&toml_src).unwrap()
}

fn local_supplier(config: &SimulationConfig, dir: &std::path::Path) -> DataSupplier {
    DataSupplier::new(SeriesStore::new(dir), None, config.supplier_config())
}

#[test]
fn identical_runs_are_byte_identical_across_thread_counts() {
    let dir = tempfile::tempdir().unwrap();
    seed_store(dir.path(), &["sh600036", "sz000001", "sh601318", "usAAPL", "sh000300"]);

    let config = test_config(dir.path());
    let supplier = local_supplier(&config, dir.path());
    let master = SimulationMaster::new(config);

    let serial = rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .unwrap()
        .install(|| master.run(&supplier, &AtomicBool::new(false)))
        .unwrap();

    let parallel = rayon::ThreadPoolBuilder::new()
        .num_threads(8)
        .build()
        .unwrap()
        .install(|| master.run(&supplier, &AtomicBool::new(false)))
        .unwrap();

    let a = serde_json::to_string(&serial).unwrap();
    let b = serde_json::to_string(&parallel).unwrap();
    assert_eq!(a, b, "results must not depend on worker interleaving");
}

#[test]
fn run_produces_coherent_orders_and_equity() {
    let dir = tempfile::tempdir().unwrap();
    seed_store(dir.path(), &["sh600036", "sz000001", "sh601318", "usAAPL", "sh000300"]);

    let config = test_config(dir.path());
    let supplier = local_supplier(&config, dir.path());
    let master = SimulationMaster::new(config);

    let result = master.run(&supplier, &AtomicBool::new(false)).unwrap();

    // Every closed order is strictly buy-then-sell.
    for order in &result.orders {
        if order.status == OrderStatus::Closed {
            assert!(order.sell_date.unwrap() > order.buy_date);
            assert!(order.keep_days > 0);
        }
    }

    // Cash never negative across the whole curve.
    for point in &result.equity_curve {
        assert!(point.cash >= 0.0, "negative cash on {}", point.date);
    }

    // The equity calendar is strictly ascending.
    for pair in result.equity_curve.windows(2) {
        assert!(pair[0].date < pair[1].date);
    }

    // Actions are sorted by (date, symbol).
    for pair in result.actions.windows(2) {
        let key_a = (pair[0].date, pair[0].symbol.clone());
        let key_b = (pair[1].date, pair[1].symbol.clone());
        assert!(key_a <= key_b);
    }

    // Benchmark curve shares the equity calendar.
    assert_eq!(result.benchmark_curve.len(), result.equity_curve.len());
    assert!(result.summary.benchmark_return.is_some());
}

#[test]
fn dropped_symbol_is_logged_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    // sh601318 and the benchmark are deliberately missing from the store.
    seed_store(dir.path(), &["sh600036", "sz000001", "usAAPL"]);

    let config = test_config(dir.path());
    let supplier = local_supplier(&config, dir.path());
    let master = SimulationMaster::new(config);

    let result = master.run(&supplier, &AtomicBool::new(false)).unwrap();

    assert!(result
        .actions
        .iter()
        .any(|a| a.symbol.to_string() == "sh601318"
            && a.reason.starts_with("data-unavailable")));
    // Missing benchmark degrades to an empty curve, not a failure.
    assert!(result.benchmark_curve.is_empty());
    assert!(result.summary.benchmark_return.is_none());
}

#[test]
fn pre_set_cancellation_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    seed_store(dir.path(), &["sh600036", "sz000001", "sh601318", "usAAPL"]);

    let config = test_config(dir.path());
    let supplier = local_supplier(&config, dir.path());
    let master = SimulationMaster::new(config);

    let cancel = AtomicBool::new(true);
    assert!(matches!(
        master.run(&supplier, &cancel),
        Err(RunError::Cancelled)
    ));
}

#[test]
fn insufficient_history_universe_yields_zero_orders() {
    let dir = tempfile::tempdir().unwrap();
    let store = SeriesStore::new(dir.path());
    // Only 10 bars against a 20-bar lookback.
    for raw in ["sh600036", "sz000001", "sh601318", "usAAPL"] {
        let symbol: Symbol = raw.parse().unwrap();
        let bars = generate_bars(7, d(2020, 1, 1), d(2020, 1, 14), 50.0);
        let series = PriceSeries::new(symbol, bars, d(2020, 1, 1), d(2020, 1, 14));
        store.write(&series, None).unwrap();
    }

    let mut config = test_config(dir.path());
    config.simulation.benchmark = None;
    config.simulation.end = Some(d(2020, 1, 14));
    let supplier = local_supplier(&config, dir.path());
    let master = SimulationMaster::new(config);

    let result = master.run(&supplier, &AtomicBool::new(false)).unwrap();
    assert!(result.orders.is_empty());
    assert!(result
        .actions
        .iter()
        .all(|a| a.reason.starts_with("insufficient-history")));
    assert_eq!(result.actions.len(), 4);
}
