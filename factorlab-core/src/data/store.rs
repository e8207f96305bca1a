//! Parquet series store.
//!
//! Layout: `{store_dir}/symbol={SYMBOL}/bars.parquet` plus a `meta.json`
//! sidecar per symbol recording the covered date range and a revision
//! counter.
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Optimistic concurrency: writes carry the revision they were based on,
//!   and a mismatch returns `MergeConflict` so the caller re-reads instead
//!   of silently losing a concurrent merge
//! - Integrity validation on load (schema check, row count > 0)
//! - Quarantine for corrupt files ({filename}.quarantined)

use super::provider::DataError;
use crate::domain::{Bar, PriceSeries, Symbol};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata sidecar for a stored symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMeta {
    pub symbol: String,
    pub covered_start: NaiveDate,
    pub covered_end: NaiveDate,
    pub bar_count: usize,
    pub data_hash: String,
    /// Incremented on every successful write; used for conflict detection.
    pub revision: u64,
    pub last_updated: chrono::NaiveDateTime,
}

/// The Parquet-backed per-symbol series store.
pub struct SeriesStore {
    store_dir: PathBuf,
}

impl SeriesStore {
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
        }
    }

    /// Root directory of the store.
    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    fn symbol_dir(&self, symbol: &Symbol) -> PathBuf {
        self.store_dir.join(format!("symbol={symbol}"))
    }

    fn bars_path(&self, symbol: &Symbol) -> PathBuf {
        self.symbol_dir(symbol).join("bars.parquet")
    }

    fn meta_path(&self, symbol: &Symbol) -> PathBuf {
        self.symbol_dir(symbol).join("meta.json")
    }

    /// Read a symbol's metadata sidecar, if present and parseable.
    pub fn meta(&self, symbol: &Symbol) -> Option<StoreMeta> {
        let content = fs::read_to_string(self.meta_path(symbol)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Load the full persisted series for a symbol.
    ///
    /// A corrupt Parquet file is quarantined and reported as `NoLocalData`,
    /// so the supplier treats the symbol as uncached and refetches.
    pub fn load(&self, symbol: &Symbol) -> Result<PriceSeries, DataError> {
        let meta = self.meta(symbol).ok_or_else(|| DataError::NoLocalData {
            symbol: symbol.to_string(),
        })?;

        let path = self.bars_path(symbol);
        if !path.exists() {
            return Err(DataError::NoLocalData {
                symbol: symbol.to_string(),
            });
        }

        let bars = match load_and_validate_parquet(&path) {
            Ok(bars) => bars,
            Err(e) => {
                let quarantine = path.with_extension("parquet.quarantined");
                eprintln!(
                    "WARNING: quarantining corrupt store file {}: {e}",
                    path.display()
                );
                let _ = fs::rename(&path, &quarantine);
                return Err(DataError::NoLocalData {
                    symbol: symbol.to_string(),
                });
            }
        };

        Ok(PriceSeries::new(
            symbol.clone(),
            bars,
            meta.covered_start,
            meta.covered_end,
        ))
    }

    /// Persist a merged series atomically.
    ///
    /// `expected_revision` is the revision of the meta the caller read
    /// before merging (`None` for a symbol it found absent). If the stored
    /// revision no longer matches, another writer got there first and the
    /// call fails with `MergeConflict` — the caller must re-read and merge
    /// again rather than overwrite.
    pub fn write(
        &self,
        series: &PriceSeries,
        expected_revision: Option<u64>,
    ) -> Result<(), DataError> {
        if series.bars.is_empty() {
            return Err(DataError::StoreError("no bars to store".into()));
        }

        let current = self.meta(&series.symbol).map(|m| m.revision);
        if current != expected_revision {
            return Err(DataError::MergeConflict {
                symbol: series.symbol.to_string(),
            });
        }

        let sym_dir = self.symbol_dir(&series.symbol);
        fs::create_dir_all(&sym_dir)
            .map_err(|e| DataError::StoreError(format!("failed to create dir: {e}")))?;

        let df = bars_to_dataframe(&series.bars)?;
        let path = self.bars_path(&series.symbol);
        let tmp_path = path.with_extension("parquet.tmp");

        write_parquet(&df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            // Clean up temp file on rename failure
            let _ = fs::remove_file(&tmp_path);
            DataError::StoreError(format!("atomic rename failed: {e}"))
        })?;

        let meta = StoreMeta {
            symbol: series.symbol.to_string(),
            covered_start: series.covered_start,
            covered_end: series.covered_end,
            bar_count: series.bars.len(),
            data_hash: blake3::hash(
                &serde_json::to_vec(&series.bars)
                    .map_err(|e| DataError::StoreError(format!("hash serialization: {e}")))?,
            )
            .to_hex()
            .to_string(),
            revision: expected_revision.unwrap_or(0) + 1,
            last_updated: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::StoreError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(&series.symbol), meta_json)
            .map_err(|e| DataError::StoreError(format!("meta write: {e}")))?;

        Ok(())
    }

    /// Covered date ranges for a list of symbols (for `cache status`).
    pub fn status(&self, symbols: &[Symbol]) -> Vec<StoreStatus> {
        symbols
            .iter()
            .map(|sym| {
                let meta = self.meta(sym);
                StoreStatus {
                    symbol: sym.clone(),
                    cached: meta.is_some(),
                    covered_start: meta.as_ref().map(|m| m.covered_start),
                    covered_end: meta.as_ref().map(|m| m.covered_end),
                    bar_count: meta.as_ref().map(|m| m.bar_count),
                }
            })
            .collect()
    }
}

/// Store status for a single symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStatus {
    pub symbol: Symbol,
    pub cached: bool,
    pub covered_start: Option<NaiveDate>,
    pub covered_end: Option<NaiveDate>,
    pub bar_count: Option<usize>,
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

const EXPECTED_COLS: [&str; 9] = [
    "date",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "amount",
    "prev_close",
    "pct_change",
];

fn bars_to_dataframe(bars: &[Bar]) -> Result<DataFrame, DataError> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    let dates: Vec<i32> = bars
        .iter()
        .map(|b| (b.date - epoch).num_days() as i32)
        .collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();
    let amounts: Vec<f64> = bars.iter().map(|b| b.amount).collect();
    let prev_closes: Vec<f64> = bars.iter().map(|b| b.prev_close).collect();
    let pct_changes: Vec<f64> = bars.iter().map(|b| b.pct_change).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
        Column::new("amount".into(), amounts),
        Column::new("prev_close".into(), prev_closes),
        Column::new("pct_change".into(), pct_changes),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<Bar>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::ValidationError("empty parquet file".into()));
    }

    for col_name in &EXPECTED_COLS {
        if df.column(col_name).is_err() {
            return Err(DataError::ValidationError(format!(
                "missing column '{col_name}'"
            )));
        }
    }

    dataframe_to_bars(&df)
}

fn f64_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Float64Chunked, DataError> {
    df.column(name)
        .map_err(|e| DataError::ParquetError(format!("column read: {e}")))?
        .f64()
        .map_err(|e| DataError::ParquetError(format!("{name} column type: {e}")))
}

fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<Bar>, DataError> {
    let date_ca = df
        .column("date")
        .map_err(|e| DataError::ParquetError(format!("column read: {e}")))?
        .date()
        .map_err(|e| DataError::ParquetError(format!("date column type: {e}")))?;
    let open_ca = f64_column(df, "open")?;
    let high_ca = f64_column(df, "high")?;
    let low_ca = f64_column(df, "low")?;
    let close_ca = f64_column(df, "close")?;
    let vol_ca = df
        .column("volume")
        .map_err(|e| DataError::ParquetError(format!("column read: {e}")))?
        .u64()
        .map_err(|e| DataError::ParquetError(format!("volume column type: {e}")))?;
    let amount_ca = f64_column(df, "amount")?;
    let prev_close_ca = f64_column(df, "prev_close")?;
    let pct_change_ca = f64_column(df, "pct_change")?;

    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    let n = df.height();
    let mut bars = Vec::with_capacity(n);

    for i in 0..n {
        let date_days = date_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
        let date = epoch + chrono::Duration::days(date_days as i64);

        bars.push(Bar {
            date,
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            volume: vol_ca.get(i).unwrap_or(0),
            amount: amount_ca.get(i).unwrap_or(f64::NAN),
            prev_close: prev_close_ca.get(i).unwrap_or(f64::NAN),
            pct_change: pct_change_ca.get(i).unwrap_or(f64::NAN),
        });
    }

    Ok(bars)
}
