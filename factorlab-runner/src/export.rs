//! CSV artifact export — orders.csv, actions.csv, equity.csv.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::result::SimulationResult;
use factorlab_core::domain::ActionKind;

/// Write the run's artifacts into `dir` (created if missing).
pub fn write_artifacts(dir: &Path, result: &SimulationResult) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create output dir {}", dir.display()))?;

    write_orders(&dir.join("orders.csv"), result)?;
    write_actions(&dir.join("actions.csv"), result)?;
    write_equity(&dir.join("equity.csv"), result)?;

    let summary_json = serde_json::to_string_pretty(&result.summary)?;
    fs::write(dir.join("summary.json"), summary_json).context("write summary.json")?;

    Ok(())
}

fn write_orders(path: &Path, result: &SimulationResult) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    writer.write_record([
        "symbol",
        "status",
        "buy_date",
        "buy_price",
        "buy_qty",
        "buy_factor",
        "sell_date",
        "sell_price",
        "sell_reason",
        "keep_days",
        "commission",
        "realized_profit",
    ])?;
    for order in &result.orders {
        writer.write_record([
            order.symbol.to_string(),
            format!("{:?}", order.status),
            order.buy_date.to_string(),
            format!("{:.4}", order.buy_price),
            order.buy_qty.to_string(),
            order.buy_factor.clone(),
            order.sell_date.map(|d| d.to_string()).unwrap_or_default(),
            order
                .sell_price
                .map(|p| format!("{p:.4}"))
                .unwrap_or_default(),
            order
                .sell_reason
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_default(),
            order.keep_days.to_string(),
            format!("{:.4}", order.commission),
            format!("{:.4}", order.realized_profit),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_actions(path: &Path, result: &SimulationResult) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    writer.write_record(["date", "symbol", "kind", "price", "reason"])?;
    for action in &result.actions {
        let kind = match action.kind {
            ActionKind::Buy => "buy",
            ActionKind::Sell => "sell",
            ActionKind::Skip => "skip",
        };
        writer.write_record([
            action.date.to_string(),
            action.symbol.to_string(),
            kind.to_string(),
            action.price.map(|p| format!("{p:.4}")).unwrap_or_default(),
            action.reason.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_equity(path: &Path, result: &SimulationResult) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    writer.write_record(["date", "equity", "cash", "benchmark"])?;

    // The benchmark curve shares the equity calendar when present.
    let mut benchmark = result.benchmark_curve.iter().peekable();
    for point in &result.equity_curve {
        let bench_value = match benchmark.peek() {
            Some(b) if b.date == point.date => {
                let v = b.value;
                benchmark.next();
                Some(v)
            }
            _ => None,
        };
        writer.write_record([
            point.date.to_string(),
            format!("{:.2}", point.equity),
            format!("{:.2}", point.cash),
            bench_value.map(|v| format!("{v:.2}")).unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
