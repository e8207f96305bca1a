//! DataSupplier — decides per request whether the local store already
//! covers the window, fetches only the missing sub-ranges from the remote
//! provider, and merges the result back into the store.
//!
//! Merges for one symbol are serialized by a per-symbol writer lock;
//! across symbols they are independent. A `MergeConflict` from the store
//! (revision moved underneath us) is retried once with a fresh read.
//! Remote failures degrade to whatever local coverage overlaps the
//! request; a completely uncovered, unfetchable symbol is `NotAvailable`.

use super::provider::{DataError, QuoteProvider};
use super::store::SeriesStore;
use crate::domain::{PriceSeries, Symbol};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Whether a request may reach the remote provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Use the store when it covers the request, the provider otherwise.
    Auto,
    /// Never touch the network; uncovered symbols are NotAvailable.
    LocalOnly,
}

/// Supplier construction-time configuration (no process-wide globals).
#[derive(Debug, Clone)]
pub struct SupplierConfig {
    pub fetch_mode: FetchMode,
    /// Window span when the caller omits `start`: `end` minus this many years.
    pub default_span_years: u32,
}

impl Default for SupplierConfig {
    fn default() -> Self {
        Self {
            fetch_mode: FetchMode::Auto,
            default_span_years: 2,
        }
    }
}

pub struct DataSupplier {
    store: SeriesStore,
    provider: Option<Box<dyn QuoteProvider>>,
    config: SupplierConfig,
    /// Single-writer-per-symbol merge locks.
    merge_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DataSupplier {
    pub fn new(
        store: SeriesStore,
        provider: Option<Box<dyn QuoteProvider>>,
        config: SupplierConfig,
    ) -> Self {
        Self {
            store,
            provider,
            config,
            merge_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch a contiguous series for [start, end], consulting the store
    /// first and the provider only for missing sub-ranges.
    ///
    /// Omitted bounds are derived: `end` defaults to today (Auto) or the
    /// last locally covered date (LocalOnly); `start` defaults to `end`
    /// minus the configured span.
    pub fn fetch(
        &self,
        symbol: &Symbol,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<PriceSeries, DataError> {
        let (start, end) = self.resolve_window(symbol, start, end)?;

        let local = match self.store.load(symbol) {
            Ok(series) => Some(series),
            Err(DataError::NoLocalData { .. }) => None,
            Err(e) => return Err(e),
        };

        match self.config.fetch_mode {
            FetchMode::LocalOnly => {
                let series = local.ok_or_else(|| DataError::NotAvailable {
                    symbol: symbol.to_string(),
                })?;
                let sliced = series.slice(start, end);
                if sliced.is_empty() {
                    return Err(DataError::NotAvailable {
                        symbol: symbol.to_string(),
                    });
                }
                Ok(sliced)
            }
            FetchMode::Auto => {
                if let Some(ref series) = local {
                    if series.covers(start, end) {
                        return Ok(series.slice(start, end));
                    }
                }
                self.fetch_and_merge(symbol, start, end, false)
            }
        }
    }

    /// Refetch [start, end] from the provider even when the store already
    /// covers it, merging the fresh bars over the stored ones.
    pub fn refresh(
        &self,
        symbol: &Symbol,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<PriceSeries, DataError> {
        let (start, end) = self.resolve_window(symbol, start, end)?;
        self.fetch_and_merge(symbol, start, end, true)
    }

    fn resolve_window(
        &self,
        symbol: &Symbol,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<(NaiveDate, NaiveDate), DataError> {
        let end = match end {
            Some(e) => e,
            None => match self.config.fetch_mode {
                FetchMode::Auto => chrono::Local::now().date_naive(),
                FetchMode::LocalOnly => {
                    self.store
                        .meta(symbol)
                        .map(|m| m.covered_end)
                        .ok_or_else(|| DataError::NotAvailable {
                            symbol: symbol.to_string(),
                        })?
                }
            },
        };
        let start = start
            .unwrap_or_else(|| end - chrono::Duration::days(365 * self.config.default_span_years as i64));
        if start > end {
            return Err(DataError::ValidationError(format!(
                "start {start} after end {end}"
            )));
        }
        Ok((start, end))
    }

    fn symbol_lock(&self, symbol: &Symbol) -> Arc<Mutex<()>> {
        let mut locks = self.merge_locks.lock().unwrap();
        locks
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn fetch_and_merge(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
        force: bool,
    ) -> Result<PriceSeries, DataError> {
        let lock = self.symbol_lock(symbol);
        let _guard = lock.lock().unwrap();

        // One retry: a MergeConflict means another writer landed between
        // our read and write, so re-read and merge against its result.
        for attempt in 0..2 {
            // Fresh read under the lock.
            let revision = self.store.meta(symbol).map(|m| m.revision);
            let local = match self.store.load(symbol) {
                Ok(series) => Some(series),
                Err(DataError::NoLocalData { .. }) => None,
                Err(e) => return Err(e),
            };
            if !force {
                if let Some(ref series) = local {
                    if series.covers(start, end) {
                        return Ok(series.slice(start, end));
                    }
                }
            }

            let mut series = local.unwrap_or_else(|| {
                // Empty shell; the first merge establishes real coverage.
                PriceSeries::new(symbol.clone(), Vec::new(), start, start)
            });
            let had_local = !series.is_empty();

            let ranges = if force {
                vec![(start, end)]
            } else {
                missing_ranges(had_local.then_some(&series), start, end)
            };
            let mut merged_any = false;
            for (sub_start, sub_end) in ranges {
                let provider = match &self.provider {
                    Some(p) => p,
                    None => break,
                };
                match provider.fetch(symbol, sub_start, sub_end) {
                    Ok(bars) => {
                        series.merge(bars, sub_start, sub_end);
                        merged_any = true;
                    }
                    Err(e) => {
                        eprintln!("WARNING: remote fetch failed for {symbol} [{sub_start}..{sub_end}]: {e}");
                        break;
                    }
                }
            }

            if series.is_empty() {
                return Err(DataError::NotAvailable {
                    symbol: symbol.to_string(),
                });
            }

            if merged_any {
                match self.store.write(&series, revision) {
                    Ok(()) => {}
                    Err(DataError::MergeConflict { .. }) if attempt == 0 => continue,
                    Err(e) => return Err(e),
                }
            }

            // Degraded or complete: return whatever now overlaps the request.
            let sliced = series.slice(start, end);
            if sliced.is_empty() {
                return Err(DataError::NotAvailable {
                    symbol: symbol.to_string(),
                });
            }
            return Ok(sliced);
        }

        Err(DataError::MergeConflict {
            symbol: symbol.to_string(),
        })
    }
}

/// The sub-ranges of [start, end] a local series does not cover: at most
/// one leading and one trailing range.
fn missing_ranges(
    local: Option<&PriceSeries>,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<(NaiveDate, NaiveDate)> {
    let series = match local {
        Some(s) => s,
        None => return vec![(start, end)],
    };
    let mut ranges = Vec::new();
    if start < series.covered_start {
        ranges.push((start, series.covered_start - chrono::Duration::days(1)));
    }
    if end > series.covered_end {
        ranges.push((series.covered_end + chrono::Duration::days(1), end));
    }
    ranges
}
