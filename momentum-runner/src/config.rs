//! Serializable backtest configuration.
//!
//! Wraps `momentum_core::fingerprint::RunConfig` (the strategy/optimizer/risk
//! parameters the engine needs) with the data-scope parameters the runner
//! needs to actually build a panel and execute a trial: the universe of
//! symbols and the date window.

use chrono::NaiveDate;
use momentum_core::fingerprint::RunConfig as CoreRunConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("universe must not be empty")]
    EmptyUniverse,
    #[error("start_date {start} must be before end_date {end}")]
    InvertedDateRange { start: NaiveDate, end: NaiveDate },
}

/// Full configuration for a single backtest run, including data scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Strategy + optimizer + risk + execution parameters.
    pub core: CoreRunConfig,

    /// Backtest start date (inclusive).
    pub start_date: NaiveDate,

    /// Backtest end date (inclusive).
    pub end_date: NaiveDate,

    /// Universe of symbols to trade.
    pub universe: Vec<String>,

    /// Master RNG seed for this run (used by the tuner for reproducibility).
    pub seed: u64,
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.universe.is_empty() {
            return Err(ConfigError::EmptyUniverse);
        }
        if self.start_date >= self.end_date {
            return Err(ConfigError::InvertedDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        Ok(())
    }

    /// Deterministic hash ID for this configuration, covering every field
    /// (data scope included, unlike the core crate's `config_hash`/`full_hash`
    /// split which is scoped to strategy parameters alone).
    ///
    /// Two runs with identical configs share a `run_id` and can reuse a
    /// cached result.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).expect("RunConfig serialization failed");
        let hash = blake3::hash(json.as_bytes());
        format!("{}", hash.to_hex())
    }
}
