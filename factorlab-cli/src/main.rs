//! FactorLab CLI — download, run, and cache status commands.
//!
//! Commands:
//! - `download` — fetch daily bars into the Parquet store
//! - `run` — execute a simulation from a TOML config file
//! - `cache status` — report covered date ranges per symbol

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use factorlab_core::data::{
    CircuitBreaker, DataSupplier, DownloadProgress, EastmoneyProvider, FetchMode, SeriesStore,
    StdoutProgress, SupplierConfig,
};
use factorlab_core::domain::Symbol;
use factorlab_runner::{write_artifacts, SimulationConfig, SimulationMaster};

#[derive(Parser)]
#[command(
    name = "factorlab",
    about = "FactorLab CLI — factor-driven trading simulator"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download daily bars into the Parquet store.
    Download {
        /// Symbols to download (e.g., sh600036 sz000001 usAAPL).
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Start date (YYYY-MM-DD). Defaults to the configured span back from end.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Refetch the whole range even when the store already covers it.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Store directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
    /// Execute a simulation from a TOML config file.
    Run {
        /// Path to the TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Offline mode: never touch the network.
        #[arg(long, default_value_t = false)]
        offline: bool,

        /// Output directory for result artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Store management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report covered date ranges for the given symbols.
    Status {
        /// Symbols to report on.
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Store directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Download {
            symbols,
            start,
            end,
            force,
            cache_dir,
        } => run_download(symbols, start, end, force, cache_dir),
        Commands::Run {
            config,
            offline,
            output_dir,
        } => run_simulation(config, offline, output_dir),
        Commands::Cache { action } => match action {
            CacheAction::Status { symbols, cache_dir } => run_cache_status(symbols, cache_dir),
        },
    }
}

fn parse_symbols(raw: &[String]) -> Result<Vec<Symbol>> {
    raw.iter()
        .map(|s| {
            s.parse::<Symbol>()
                .with_context(|| format!("invalid symbol '{s}'"))
        })
        .collect()
}

fn parse_date(raw: Option<String>, flag: &str) -> Result<Option<NaiveDate>> {
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .with_context(|| format!("--{flag} must be YYYY-MM-DD, got '{s}'"))
    })
    .transpose()
}

fn online_supplier(
    cache_dir: PathBuf,
    config: SupplierConfig,
) -> (DataSupplier, Arc<CircuitBreaker>) {
    let breaker = Arc::new(CircuitBreaker::default_provider());
    let supplier = DataSupplier::new(
        SeriesStore::new(cache_dir),
        Some(Box::new(EastmoneyProvider::new(breaker.clone()))),
        config,
    );
    (supplier, breaker)
}

fn run_download(
    symbols: Vec<String>,
    start: Option<String>,
    end: Option<String>,
    force: bool,
    cache_dir: PathBuf,
) -> Result<()> {
    let symbols = parse_symbols(&symbols)?;
    let start = parse_date(start, "start")?;
    let end = parse_date(end, "end")?;

    let (supplier, breaker) = online_supplier(cache_dir, SupplierConfig::default());
    let progress = StdoutProgress;
    let total = symbols.len();
    let mut succeeded = 0;
    let mut failed = 0;

    for (i, symbol) in symbols.iter().enumerate() {
        progress.on_start(symbol, i, total);
        let result = if force {
            supplier.refresh(symbol, start, end).map(|_| ())
        } else {
            supplier.fetch(symbol, start, end).map(|_| ())
        };
        progress.on_complete(symbol, i, total, &result);
        match result {
            Ok(()) => succeeded += 1,
            Err(_) => {
                failed += 1;
                let cooldown = breaker.remaining_cooldown();
                if !cooldown.is_zero() {
                    println!(
                        "  provider is cooling down: retry in ~{}s",
                        cooldown.as_secs()
                    );
                }
            }
        }
    }
    progress.on_batch_complete(succeeded, failed, total);

    if failed > 0 {
        bail!("{failed}/{total} symbols failed to download");
    }
    Ok(())
}

fn run_simulation(config_path: PathBuf, offline: bool, output_dir: PathBuf) -> Result<()> {
    let config = SimulationConfig::from_file(&config_path)
        .with_context(|| format!("load config {}", config_path.display()))?;

    let mut supplier_config = config.supplier_config();
    if offline {
        supplier_config.fetch_mode = FetchMode::LocalOnly;
    }
    let cache_dir = PathBuf::from(&config.data.cache_dir);
    let supplier = if supplier_config.fetch_mode == FetchMode::LocalOnly {
        DataSupplier::new(SeriesStore::new(cache_dir), None, supplier_config)
    } else {
        let (supplier, _breaker) = online_supplier(cache_dir, supplier_config);
        supplier
    };

    let master = SimulationMaster::new(config);
    let cancel = AtomicBool::new(false);
    let result = master.run(&supplier, &cancel)?;

    write_artifacts(&output_dir, &result)?;

    let summary = &result.summary;
    println!("Simulation complete:");
    println!("  orders:        {} ({} closed, {} rejected)", summary.order_count, summary.closed_count, summary.rejected_count);
    println!("  final equity:  {:.2}", summary.final_equity);
    println!("  total return:  {:.2}%", summary.total_return * 100.0);
    if let Some(bench) = summary.benchmark_return {
        println!("  benchmark:     {:.2}%", bench * 100.0);
    }
    println!("  max drawdown:  {:.2}%", summary.max_drawdown * 100.0);
    println!("  win rate:      {:.1}%", summary.win_rate * 100.0);
    println!("  commission:    {:.2}", summary.total_commission);
    println!("Artifacts written to {}", output_dir.display());

    Ok(())
}

fn run_cache_status(symbols: Vec<String>, cache_dir: PathBuf) -> Result<()> {
    let symbols = parse_symbols(&symbols)?;
    let store = SeriesStore::new(cache_dir);

    println!("{:<12} {:>8} {:>12} {:>12} {:>8}", "symbol", "cached", "start", "end", "bars");
    for status in store.status(&symbols) {
        println!(
            "{:<12} {:>8} {:>12} {:>12} {:>8}",
            status.symbol.to_string(),
            if status.cached { "yes" } else { "no" },
            status
                .covered_start
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".into()),
            status
                .covered_end
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".into()),
            status
                .bar_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".into()),
        );
    }
    Ok(())
}
