//! # Momentum Runner
//!
//! Batch orchestration layer on top of `momentum-core`: wires a `RunConfig`
//! and a universe of bars through the engine, caches and ranks the results,
//! and drives hyperparameter search over the strategy/optimizer space.
//!
//! ## Components
//!
//! - `config::RunConfig` — serializable run configuration (data scope + core
//!   strategy/optimizer/risk parameters), content-addressed by `run_id()`
//! - `runner::run_backtest` — executes a single trial end to end
//! - `cache::ResultCache` — on-disk cache of trial results keyed by run_id
//! - `fitness::FitnessMetric` — selects which performance metric ranks trials
//! - `leaderboard::SymbolLeaderboard` — bounded, deduplicated top-N ranking
//! - `history::YoloHistory` — append-only JSONL trial log with write filtering
//! - `tuner` — grid/random/Bayesian-fallback hyperparameter search
//! - `export` — JSON/CSV/Markdown artifact export

pub mod cache;
pub mod config;
pub mod export;
pub mod fitness;
pub mod history;
pub mod leaderboard;
pub mod runner;
pub mod tuner;

pub use cache::ResultCache;
pub use config::{ConfigError, RunConfig, RunId};
pub use export::{export_equity_csv, export_json, export_trades_csv, ArtifactManager, ArtifactPaths};
pub use fitness::FitnessMetric;
pub use history::{ComponentSummary, HistoryEntry, WriteFilter, YoloHistory};
pub use leaderboard::{InsertResult, LeaderboardEntry, SymbolLeaderboard};
pub use runner::{dataset_hash, run_backtest, BacktestResult, RunError, SCHEMA_VERSION};
pub use tuner::{tune, ConvergenceComparison, ParamGrid, SearchMethod, TrialOutcome, TuningResult};
