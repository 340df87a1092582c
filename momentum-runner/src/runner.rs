//! Orchestration entry point: wires a `RunConfig` and raw bar data through
//! alignment, the momentum strategy, the engine, and the metrics pipeline
//! into a single `BacktestResult`.

use crate::config::{ConfigError, RunConfig};
use crate::fitness::FitnessMetric;
use chrono::NaiveDate;
use momentum_core::data::align::{align_panel, AlignError};
use momentum_core::domain::{AssetMetadata, Bar, DatasetHash, SkippedSignal as CoreSkippedSignal, Trade};
use momentum_core::engine::{self, EngineConfig, EngineError, EquityPoint, ExecutionConfig};
use momentum_core::metrics::{self, PerformanceMetrics};
use momentum_core::strategy::MomentumStrategy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid run configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("alignment error: {0}")]
    Alignment(#[from] AlignError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Complete output of a single backtest trial: the engine's raw result plus
/// the derived performance metrics, tagged with the config and dataset that
/// produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub schema_version: u32,
    pub run_id: String,
    pub config: RunConfig,
    pub dataset_hash: DatasetHash,
    pub metrics: PerformanceMetrics,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub skipped_signals: Vec<CoreSkippedSignal>,
    pub rebalance_count: usize,
    pub bar_count: usize,
}

impl BacktestResult {
    /// Extract the value of a chosen fitness metric for leaderboard/tuner use.
    pub fn fitness(&self, metric: FitnessMetric) -> f64 {
        metric.extract(&self.metrics)
    }
}

/// Deterministic BLAKE3 hash over every OHLCV value in the panel, in sorted
/// symbol order so iteration order of `symbol_bars` never affects the hash.
pub fn dataset_hash(symbol_bars: &HashMap<String, Vec<Bar>>) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    let mut symbols: Vec<&String> = symbol_bars.keys().collect();
    symbols.sort();
    for symbol in symbols {
        hasher.update(symbol.as_bytes());
        for bar in &symbol_bars[symbol] {
            hasher.update(bar.date.to_string().as_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
            hasher.update(&bar.adj_close.to_le_bytes());
        }
    }
    DatasetHash::from_bytes(hasher.finalize().as_bytes())
}

fn window(start: NaiveDate, end: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    Some((start, end))
}

/// Run a single backtest trial end to end.
pub fn run_backtest(
    config: &RunConfig,
    symbol_bars: &HashMap<String, Vec<Bar>>,
    assets: &HashMap<String, AssetMetadata>,
) -> Result<BacktestResult, RunError> {
    config.validate()?;

    let universe: HashMap<String, Vec<Bar>> = symbol_bars
        .iter()
        .filter(|(symbol, _)| {
            config.universe.contains(symbol)
                || config.core.strategy.safe_asset.as_deref() == Some(symbol.as_str())
        })
        .map(|(symbol, bars)| (symbol.clone(), bars.clone()))
        .collect();

    let strategy = MomentumStrategy::new(config.core.strategy.clone());
    let panel = align_panel(
        &universe,
        window(config.start_date, config.end_date),
        strategy.required_history(),
    )?;

    let engine_config = EngineConfig {
        initial_capital: config.core.initial_capital,
        execution: ExecutionConfig {
            commission_pct: config.core.commission_pct,
            slippage_pct: config.core.slippage_pct,
            execution_delay: config.core.execution_delay,
        },
        risk: config.core.risk.clone(),
        optimizer: config.core.optimizer.clone(),
        assets: assets.clone(),
    };

    let engine_result = engine::run(&strategy, &panel, &engine_config)?;
    let metrics = metrics::compute(
        &engine_result.equity_curve,
        &engine_result.trades,
        config.core.optimizer.risk_free_rate_annual,
    );

    info!(
        run_id = %config.run_id(),
        bars = panel.len(),
        final_equity = engine_result.final_equity,
        rebalances = engine_result.rebalance_count,
        "backtest completed"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: config.run_id(),
        config: config.clone(),
        dataset_hash: dataset_hash(&universe),
        metrics,
        equity_curve: engine_result.equity_curve,
        trades: engine_result.trades,
        skipped_signals: engine_result.skipped_signals,
        rebalance_count: engine_result.rebalance_count,
        bar_count: panel.len(),
    })
}
