//! Intersection-based multi-symbol calendar alignment.
//!
//! Unlike a union-of-dates alignment (which fabricates void bars for symbols
//! missing a date another symbol trades on), this alignment keeps only dates
//! on which *every* symbol has a bar, so the resulting panel never needs a
//! void-bar policy downstream. The `(start, end)` window is applied only
//! after the intersection is computed, so it can never reintroduce a
//! partial-coverage date at either edge.

use crate::domain::Bar;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlignError {
    #[error("empty symbol set")]
    EmptySymbolSet,
    #[error("symbol {0} has an empty price series")]
    EmptySeries(String),
    #[error("inconsistent timezone/date convention across symbols")]
    InconsistentTimezone,
    #[error("insufficient history: aligned panel has {available} bars, {required} required")]
    InsufficientHistory { available: usize, required: usize },
}

/// A calendar-aligned, intersection-based panel: every symbol has a valid
/// bar on every date in `dates`.
#[derive(Debug, Clone)]
pub struct AlignedPanel {
    pub dates: Vec<NaiveDate>,
    pub symbols: Vec<String>,
    bars: HashMap<String, Vec<Bar>>,
}

impl AlignedPanel {
    /// Bars for `symbol`, one per date in `self.dates`, same order.
    pub fn series(&self, symbol: &str) -> Option<&[Bar]> {
        self.bars.get(symbol).map(|v| v.as_slice())
    }

    pub fn close(&self, symbol: &str, index: usize) -> Option<f64> {
        self.bars
            .get(symbol)
            .and_then(|v| v.get(index))
            .map(|b| b.close)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Align raw per-symbol bar series to their common intersection, then trim
/// to `window` if provided.
///
/// Bars for a given symbol are assumed sorted ascending by date with no
/// duplicate dates (an ingest-layer invariant); this function does not
/// re-sort, it only intersects.
pub fn align_panel(
    symbol_bars: &HashMap<String, Vec<Bar>>,
    window: Option<(NaiveDate, NaiveDate)>,
    required_history: usize,
) -> Result<AlignedPanel, AlignError> {
    if symbol_bars.is_empty() {
        return Err(AlignError::EmptySymbolSet);
    }

    let mut symbols: Vec<String> = symbol_bars.keys().cloned().collect();
    symbols.sort();

    for sym in &symbols {
        if symbol_bars[sym].is_empty() {
            return Err(AlignError::EmptySeries(sym.clone()));
        }
    }

    let mut common: Option<BTreeSet<NaiveDate>> = None;
    for sym in &symbols {
        let dates: BTreeSet<NaiveDate> = symbol_bars[sym].iter().map(|b| b.date).collect();
        common = Some(match common {
            None => dates,
            Some(acc) => acc.intersection(&dates).copied().collect(),
        });
    }
    let mut common_dates: Vec<NaiveDate> = common.unwrap_or_default().into_iter().collect();
    common_dates.sort();

    if let Some((start, end)) = window {
        common_dates.retain(|d| *d >= start && *d <= end);
    }

    if common_dates.len() < required_history + 1 {
        return Err(AlignError::InsufficientHistory {
            available: common_dates.len(),
            required: required_history + 1,
        });
    }

    let mut bars: HashMap<String, Vec<Bar>> = HashMap::new();
    for sym in &symbols {
        let by_date: HashMap<NaiveDate, &Bar> =
            symbol_bars[sym].iter().map(|b| (b.date, b)).collect();
        let mut series = Vec::with_capacity(common_dates.len());
        for date in &common_dates {
            let bar = by_date
                .get(date)
                .unwrap_or_else(|| panic!("date {date} missing from intersection for {sym}"));
            if bar.is_void() {
                return Err(AlignError::InconsistentTimezone);
            }
            series.push((*bar).clone());
        }
        bars.insert(sym.clone(), series);
    }

    Ok(AlignedPanel {
        dates: common_dates,
        symbols,
        bars,
    })
}
