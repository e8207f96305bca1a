//! PriceSeries — a symbol's ordered, date-unique bar sequence with
//! recorded coverage bounds.
//!
//! The series is mutated only through `merge`, which is idempotent:
//! merging the same fetched range twice yields the same series as merging
//! it once. Coverage bounds always bracket the min/max stored date, and
//! may extend past them when a fetch legitimately returned no bars for
//! part of the requested window (non-trading days at the range edges).

use super::bar::Bar;
use super::symbol::Symbol;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: Symbol,
    pub bars: Vec<Bar>,
    pub covered_start: NaiveDate,
    pub covered_end: NaiveDate,
}

impl PriceSeries {
    /// Build a series from fetched bars, recording the covered window.
    ///
    /// Bars are sorted ascending and de-duplicated by date (last wins).
    /// The covered window is widened to bracket the stored dates if the
    /// caller passed narrower bounds.
    pub fn new(symbol: Symbol, mut bars: Vec<Bar>, start: NaiveDate, end: NaiveDate) -> Self {
        sort_dedup(&mut bars);
        let covered_start = bars.first().map(|b| b.date.min(start)).unwrap_or(start);
        let covered_end = bars.last().map(|b| b.date.max(end)).unwrap_or(end);
        Self {
            symbol,
            bars,
            covered_start,
            covered_end,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// Whether the covered window fully brackets [start, end].
    pub fn covers(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.covered_start <= start && self.covered_end >= end
    }

    /// A copy restricted to bars inside [start, end], with coverage bounds
    /// clamped to the requested window.
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> PriceSeries {
        let bars: Vec<Bar> = self
            .bars
            .iter()
            .filter(|b| b.date >= start && b.date <= end)
            .cloned()
            .collect();
        PriceSeries {
            symbol: self.symbol.clone(),
            bars,
            covered_start: start.max(self.covered_start),
            covered_end: end.min(self.covered_end),
        }
    }

    /// Merge a freshly-fetched range into the series.
    ///
    /// Local bars dated inside [fetched_start, fetched_end] are dropped in
    /// favor of the fetched ones, the result is re-sorted and de-duplicated
    /// by date keeping the newest value, and the covered window widens to
    /// the union of old and new bounds.
    pub fn merge(&mut self, fetched: Vec<Bar>, fetched_start: NaiveDate, fetched_end: NaiveDate) {
        self.bars
            .retain(|b| b.date < fetched_start || b.date > fetched_end);
        self.bars.extend(fetched);
        sort_dedup(&mut self.bars);
        self.covered_start = self.covered_start.min(fetched_start);
        self.covered_end = self.covered_end.max(fetched_end);
    }

    /// Check the series invariants: unique ascending dates, bounds bracket
    /// every stored bar.
    pub fn invariants_hold(&self) -> bool {
        let ascending_unique = self.bars.windows(2).all(|w| w[0].date < w[1].date);
        let bracketed = self
            .bars
            .iter()
            .all(|b| b.date >= self.covered_start && b.date <= self.covered_end);
        ascending_unique && bracketed && self.covered_start <= self.covered_end
    }
}

/// Sort ascending by date and de-duplicate, keeping the later entry for
/// each date (fetched bars are appended after local ones, so they win).
fn sort_dedup(bars: &mut Vec<Bar>) {
    // Stable sort preserves append order within a date.
    bars.sort_by_key(|b| b.date);
    let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars.drain(..) {
        match deduped.last() {
            Some(last) if last.date == bar.date => {
                *deduped.last_mut().unwrap() = bar;
            }
            _ => deduped.push(bar),
        }
    }
    *bars = deduped;
}
