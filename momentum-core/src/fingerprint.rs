//! Run fingerprinting — deterministic identification of strategy configurations.
//!
//! - `RunConfig`: the momentum strategy plus its portfolio-construction choice.
//! - `ConfigHash`: structural identity (method/type choices only, no parameter values).
//! - `FullHash`: exact identity (choices + all parameter values).
//! - `RunFingerprint`: complete record of a backtest run for the tuner's history log.

use crate::domain::{ConfigHash, DatasetHash, FullHash, RunId};
use crate::optimizer::OptimizerConfig;
use crate::risk::RiskConfig;
use crate::strategy::MomentumStrategyConfig;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Complete configuration of a single run: the signal-generation rule plus
/// the portfolio-construction and risk rules applied to its output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    pub strategy: MomentumStrategyConfig,
    pub optimizer: OptimizerConfig,
    pub risk: RiskConfig,
    pub initial_capital: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
    pub execution_delay: usize,
}

impl RunConfig {
    /// Structural hash: strategy/optimizer method choices only, ignoring
    /// every numeric parameter. Two runs that differ only in
    /// `lookback_period` or `max_weight` share a `config_hash` but not a
    /// `full_hash` — useful for grouping tuner trials by "shape".
    pub fn config_hash(&self) -> ConfigHash {
        let structural = format!(
            "{:?}+{}+{:?}",
            strength_method_name(&self.strategy.strength_method),
            self.strategy.dual_momentum,
            self.optimizer.method,
        );
        ConfigHash::from_bytes(structural.as_bytes())
    }

    /// Full hash: every field, via canonical (struct-field-order) JSON.
    pub fn full_hash(&self) -> FullHash {
        let json = serde_json::to_string(self).expect("RunConfig must serialize");
        FullHash::from_bytes(json.as_bytes())
    }
}

fn strength_method_name(method: &crate::strategy::StrengthMethod) -> &'static str {
    use crate::strategy::StrengthMethod;
    match method {
        StrengthMethod::Binary => "binary",
        StrengthMethod::Linear { .. } => "linear",
        StrengthMethod::Proportional => "proportional",
        StrengthMethod::MomentumRatio => "momentum_ratio",
    }
}

/// Complete fingerprint of a single backtest run.
///
/// Persisted to the tuner's JSONL trial history. Contains everything needed
/// to reproduce the run or compare it against others in the same sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunFingerprint {
    // ── Identity ──
    pub run_id: RunId,
    pub timestamp: chrono::NaiveDateTime,
    pub seed: u64,

    // ── Data scope ──
    pub symbols: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    // ── Configuration ──
    pub run_config: RunConfig,

    // ── Derived hashes ──
    pub config_hash: ConfigHash,
    pub full_hash: FullHash,
    pub dataset_hash: DatasetHash,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::OptimizationMethod;
    use crate::strategy::{RebalanceFrequency, StrengthMethod};

    fn sample_config() -> RunConfig {
        RunConfig {
            strategy: MomentumStrategyConfig {
                lookback_period: 126,
                rebalance_frequency: RebalanceFrequency::Monthly,
                position_count: 3,
                absolute_threshold: 0.0,
                safe_asset: Some("BIL".into()),
                strength_method: StrengthMethod::Proportional,
                use_volatility_adjustment: false,
                dual_momentum: true,
            },
            optimizer: OptimizerConfig {
                method: OptimizationMethod::InverseVolatility,
                ..Default::default()
            },
            risk: RiskConfig::default(),
            initial_capital: 100_000.0,
            commission_pct: 0.001,
            slippage_pct: 0.0005,
            execution_delay: 1,
        }
    }

    #[test]
    fn config_hash_is_structural() {
        let c1 = sample_config();
        let mut c2 = sample_config();
        // Same structure, different numeric parameter.
        c2.strategy.lookback_period = 252;

        assert_eq!(c1.config_hash(), c2.config_hash());
        assert_ne!(c1.full_hash(), c2.full_hash());
    }

    #[test]
    fn full_hash_differs_for_different_params() {
        let c1 = sample_config();
        let mut c2 = sample_config();
        c2.risk.max_position_size = 0.25;

        assert_ne!(c1.full_hash(), c2.full_hash());
    }

    #[test]
    fn config_hash_differs_for_different_optimizer_method() {
        let c1 = sample_config();
        let mut c2 = sample_config();
        c2.optimizer.method = OptimizationMethod::RiskParity;

        assert_ne!(c1.config_hash(), c2.config_hash());
    }

    #[test]
    fn hashing_is_deterministic() {
        let config = sample_config();
        let h1 = config.full_hash();
        let h2 = config.full_hash();
        assert_eq!(h1, h2);
    }

    #[test]
    fn run_config_serialization_roundtrip() {
        let config = sample_config();
        let json = serde_json::to_string(&config).unwrap();
        let deser: RunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deser);
        assert_eq!(config.full_hash(), deser.full_hash());
    }
}
