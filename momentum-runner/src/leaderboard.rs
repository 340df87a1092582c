//! Per-symbol leaderboard — bounded, deduplicated, sorted by fitness.
//!
//! Each symbol maintains its own leaderboard of the top N strategy configurations.
//! Deduplication key: `full_hash` (exact config + params, from the core crate's
//! `RunConfig::full_hash`). If a config with the same full_hash arrives with a
//! better fitness score, it replaces the existing entry. If worse, it is skipped.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::fitness::FitnessMetric;
use crate::runner::BacktestResult;
use momentum_core::domain::FullHash;

/// A single entry in the leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub result: BacktestResult,
    pub fitness_score: f64,
    pub iteration: usize,
    pub session_id: String,
    pub timestamp: NaiveDateTime,
}

/// Outcome of an insert operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// New entry added to the leaderboard.
    Inserted,
    /// Replaced an existing entry with the same full_hash (better score).
    Replaced,
    /// Skipped: duplicate with worse or equal score, or NaN fitness.
    Skipped,
}

/// Per-symbol leaderboard: top N strategies ranked by fitness.
#[derive(Debug)]
pub struct SymbolLeaderboard {
    symbol: String,
    entries: Vec<LeaderboardEntry>,
    max_size: usize,
    fitness_metric: FitnessMetric,
}

impl SymbolLeaderboard {
    pub fn new(symbol: String, max_size: usize, fitness_metric: FitnessMetric) -> Self {
        Self {
            symbol,
            entries: Vec::with_capacity(max_size.min(1024)),
            max_size,
            fitness_metric,
        }
    }

    /// Insert an entry. Returns the outcome.
    ///
    /// - Rejects entries with non-finite fitness scores.
    /// - Deduplicates by `full_hash`: replaces if better, skips if worse.
    /// - After insert, trims to `max_size` by removing the worst entry.
    pub fn insert(&mut self, entry: LeaderboardEntry) -> InsertResult {
        if !entry.fitness_score.is_finite() {
            return InsertResult::Skipped;
        }

        let entry_hash = entry.result.config.core.full_hash();

        if let Some(idx) = self.find_by_hash(&entry_hash) {
            if self
                .fitness_metric
                .is_better(entry.fitness_score, self.entries[idx].fitness_score)
            {
                self.entries[idx] = entry;
                self.sort_entries();
                return InsertResult::Replaced;
            }
            return InsertResult::Skipped;
        }

        if self.entries.len() < self.max_size {
            self.entries.push(entry);
            self.sort_entries();
            InsertResult::Inserted
        } else if let Some(worst) = self.entries.last() {
            if self
                .fitness_metric
                .is_better(entry.fitness_score, worst.fitness_score)
            {
                self.entries.pop();
                self.entries.push(entry);
                self.sort_entries();
                InsertResult::Inserted
            } else {
                InsertResult::Skipped
            }
        } else {
            InsertResult::Skipped
        }
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fitness_metric(&self) -> FitnessMetric {
        self.fitness_metric
    }

    fn find_by_hash(&self, hash: &FullHash) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.result.config.core.full_hash() == *hash)
    }

    fn sort_entries(&mut self) {
        // FitnessMetric.is_better(a, b) = a > b for every metric, so
        // descending f64 order is the correct ranking.
        self.entries.sort_by(|a, b| {
            b.fitness_score
                .partial_cmp(&a.fitness_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}
