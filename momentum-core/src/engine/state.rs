//! Engine configuration and the final result of a backtest run.

use crate::domain::{AssetMetadata, Trade};
use crate::engine::accounting::EquityPoint;
use crate::optimizer::OptimizerConfig;
use crate::risk::RiskConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Commission/slippage/execution-delay parameters for order fills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Commission as a fraction of notional, e.g. 0.001 = 10 bps.
    pub commission_pct: f64,
    /// Slippage as a fraction of price, applied against the trader.
    pub slippage_pct: f64,
    /// Bars between signal generation and fill, in `[0, 5]`.
    pub execution_delay: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            commission_pct: 0.0,
            slippage_pct: 0.0,
            execution_delay: 0,
        }
    }
}

/// Full configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub initial_capital: f64,
    pub execution: ExecutionConfig,
    pub risk: RiskConfig,
    pub optimizer: OptimizerConfig,
    pub assets: HashMap<String, AssetMetadata>,
}

impl EngineConfig {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            execution: ExecutionConfig::default(),
            risk: RiskConfig::default(),
            optimizer: OptimizerConfig::default(),
            assets: HashMap::new(),
        }
    }
}

/// A signal that could not be executed, with the reason (spec §4.6 step 7
/// and §7 "execution warning" — the engine must not silently succeed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSignal {
    pub date: chrono::NaiveDate,
    pub symbol: String,
    pub reason: String,
}

/// Complete output of a backtest run.
#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub skipped_signals: Vec<SkippedSignal>,
    pub rebalance_count: usize,
    pub final_equity: f64,
}

impl BacktestResult {
    /// Total return over the full equity curve, 0.0 if too short to define.
    pub fn total_return(&self) -> f64 {
        match (self.equity_curve.first(), self.equity_curve.last()) {
            (Some(first), Some(last)) if first.equity != 0.0 => last.equity / first.equity - 1.0,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_defaults_to_frictionless_full_investment() {
        let config = EngineConfig::new(100_000.0);
        assert_eq!(config.initial_capital, 100_000.0);
        assert_eq!(config.execution.commission_pct, 0.0);
        assert_eq!(config.risk.max_leverage, 1.0);
    }

    #[test]
    fn total_return_on_empty_curve_is_zero() {
        let result = BacktestResult {
            equity_curve: Vec::new(),
            trades: Vec::new(),
            skipped_signals: Vec::new(),
            rebalance_count: 0,
            final_equity: 0.0,
        };
        assert_eq!(result.total_return(), 0.0);
    }
}
