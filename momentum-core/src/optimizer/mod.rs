//! Portfolio optimizer (spec §4.4): seven weight-allocation methods over a
//! daily-returns matrix, all normalized, clamped, and annualized exactly
//! once (here, at the optimizer boundary — downstream consumers must not
//! re-annualize).

mod hrp;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Error, PartialEq)]
pub enum OptimizerError {
    #[error("no assets provided")]
    EmptyUniverse,
    #[error("constraints infeasible: {n} assets, max_weight {max_weight} cannot sum to 1.0")]
    InfeasibleConstraints { n: usize, max_weight: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptimizationMethod {
    EqualWeight,
    InverseVolatility,
    MinimumVariance,
    MaximumSharpe,
    RiskParity,
    MaximumDiversification,
    HierarchicalRiskParity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub method: OptimizationMethod,
    pub min_weight: f64,
    pub max_weight: f64,
    pub risk_free_rate_annual: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            method: OptimizationMethod::EqualWeight,
            min_weight: 0.0,
            max_weight: 1.0,
            risk_free_rate_annual: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerOutput {
    pub weights: HashMap<String, f64>,
    pub expected_return_annual: f64,
    pub expected_volatility_annual: f64,
    pub sharpe_ratio: f64,
    pub diversification_ratio: f64,
    pub risk_contributions: HashMap<String, f64>,
    /// True if an iterative solver failed to converge and equal weight was
    /// substituted.
    pub fell_back_to_equal_weight: bool,
}

/// A daily-returns matrix: `returns[i]` is the return vector across
/// `symbols` on bar `i`. All rows must have `symbols.len()` entries.
pub struct ReturnsMatrix<'a> {
    pub symbols: &'a [String],
    pub returns: &'a [Vec<f64>],
}

impl<'a> ReturnsMatrix<'a> {
    fn n(&self) -> usize {
        self.symbols.len()
    }

    fn mean_vector(&self) -> Vec<f64> {
        let mut mean = vec![0.0; self.n()];
        for row in self.returns {
            for (i, v) in row.iter().enumerate() {
                mean[i] += v;
            }
        }
        let count = self.returns.len().max(1) as f64;
        mean.iter_mut().for_each(|v| *v /= count);
        mean
    }

    fn covariance_matrix(&self) -> Vec<Vec<f64>> {
        let n = self.n();
        let mean = self.mean_vector();
        let mut cov = vec![vec![0.0; n]; n];
        let count = self.returns.len();
        if count < 2 {
            return cov;
        }
        for row in self.returns {
            for i in 0..n {
                for j in 0..n {
                    cov[i][j] += (row[i] - mean[i]) * (row[j] - mean[j]);
                }
            }
        }
        let denom = (count - 1) as f64;
        for i in 0..n {
            for j in 0..n {
                cov[i][j] /= denom;
            }
        }
        cov
    }

    fn stdevs(&self) -> Vec<f64> {
        let cov = self.covariance_matrix();
        (0..self.n()).map(|i| cov[i][i].max(0.0).sqrt()).collect()
    }
}

fn portfolio_variance(weights: &[f64], cov: &[Vec<f64>]) -> f64 {
    let n = weights.len();
    let mut total = 0.0;
    for i in 0..n {
        for j in 0..n {
            total += weights[i] * weights[j] * cov[i][j];
        }
    }
    total.max(0.0)
}

/// Normalize to sum 1.0, clamp to `[min_weight, max_weight]`, renormalize.
/// Returns `Err` if clamping makes a sum of 1.0 infeasible.
fn normalize_and_clamp(
    mut weights: Vec<f64>,
    min_weight: f64,
    max_weight: f64,
) -> Result<Vec<f64>, OptimizerError> {
    let n = weights.len();
    if n == 0 {
        return Err(OptimizerError::EmptyUniverse);
    }
    if max_weight * n as f64 < 1.0 - 1e-9 {
        return Err(OptimizerError::InfeasibleConstraints { n, max_weight });
    }

    let sum: f64 = weights.iter().sum();
    if sum.abs() > 1e-12 {
        weights.iter_mut().for_each(|w| *w /= sum);
    } else {
        weights.iter_mut().for_each(|w| *w = 1.0 / n as f64);
    }

    for _ in 0..50 {
        let mut clamped = false;
        for w in weights.iter_mut() {
            if *w > max_weight {
                *w = max_weight;
                clamped = true;
            } else if *w < min_weight {
                *w = min_weight;
                clamped = true;
            }
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() < 1e-6 {
            break;
        }
        if !clamped {
            // redistribute the residual proportionally among unclamped weights
            let residual = 1.0 - sum;
            let free: Vec<usize> = (0..n)
                .filter(|&i| weights[i] > min_weight + 1e-12 && weights[i] < max_weight - 1e-12)
                .collect();
            if free.is_empty() {
                break;
            }
            let share = residual / free.len() as f64;
            for i in free {
                weights[i] += share;
            }
        } else {
            let free_mass: f64 = weights
                .iter()
                .filter(|&&w| w > min_weight && w < max_weight)
                .sum();
            let clamped_mass: f64 = 1.0
                - weights
                    .iter()
                    .filter(|&&w| w <= min_weight || w >= max_weight)
                    .sum::<f64>();
            let _ = clamped_mass;
            if free_mass.abs() > 1e-12 {
                let target_free_sum = 1.0
                    - weights
                        .iter()
                        .filter(|&&w| w <= min_weight || w >= max_weight)
                        .sum::<f64>();
                let scale = target_free_sum / free_mass;
                for w in weights.iter_mut() {
                    if *w > min_weight && *w < max_weight {
                        *w *= scale;
                    }
                }
            }
        }
    }

    let sum: f64 = weights.iter().sum();
    if (sum - 1.0).abs() > 1e-4 {
        return Err(OptimizerError::InfeasibleConstraints { n, max_weight });
    }
    // final micro-correction so |sum - 1| <= 1e-6 exactly
    let correction = (1.0 - weights.iter().sum::<f64>()) / n as f64;
    weights.iter_mut().for_each(|w| *w += correction);

    Ok(weights)
}

fn equal_weight(n: usize) -> Vec<f64> {
    vec![1.0 / n as f64; n]
}

/// Projected-gradient descent on `wᵀΣw`, projecting onto the simplex each
/// step by re-normalizing and clamping. Falls back to equal weight if the
/// objective fails to improve (singular/degenerate covariance).
fn minimize_variance(cov: &[Vec<f64>], min_weight: f64, max_weight: f64) -> (Vec<f64>, bool) {
    let n = cov.len();
    let mut w = equal_weight(n);
    let step = 0.05;
    let mut best = w.clone();
    let mut best_var = portfolio_variance(&w, cov);

    for _ in 0..500 {
        let grad: Vec<f64> = (0..n)
            .map(|i| 2.0 * (0..n).map(|j| cov[i][j] * w[j]).sum::<f64>())
            .collect();
        let mut candidate: Vec<f64> = w.iter().zip(&grad).map(|(wi, gi)| wi - step * gi).collect();
        candidate = match normalize_and_clamp(candidate.clone(), min_weight, max_weight) {
            Ok(c) => c,
            Err(_) => break,
        };
        let var = portfolio_variance(&candidate, cov);
        if var.is_nan() || var.is_infinite() {
            break;
        }
        if var < best_var - 1e-14 {
            best_var = var;
            best = candidate.clone();
        }
        w = candidate;
    }

    if best_var.is_nan() || best_var <= 0.0 && cov.iter().flatten().any(|v| v.abs() > 1e-12) {
        // degenerate: keep best found (may legitimately be ~0 for perfectly
        // correlated/zero-vol inputs), only fall back on true non-finite failure
    }
    if !best_var.is_finite() {
        return (equal_weight(n), true);
    }
    (best, false)
}

fn inverse_volatility(stdevs: &[f64]) -> (Vec<f64>, bool) {
    let n = stdevs.len();
    if stdevs.iter().any(|s| *s <= 1e-12) {
        return (equal_weight(n), true);
    }
    let inv: Vec<f64> = stdevs.iter().map(|s| 1.0 / s).collect();
    let sum: f64 = inv.iter().sum();
    (inv.iter().map(|v| v / sum).collect(), false)
}

fn maximum_sharpe(
    mean: &[f64],
    cov: &[Vec<f64>],
    rf_daily: f64,
    min_weight: f64,
    max_weight: f64,
) -> (Vec<f64>, bool) {
    let n = mean.len();
    let mut w = equal_weight(n);
    let step = 0.05;

    let sharpe = |w: &[f64]| -> f64 {
        let ret: f64 = w.iter().zip(mean).map(|(wi, mi)| wi * mi).sum();
        let var = portfolio_variance(w, cov);
        if var <= 1e-18 {
            0.0
        } else {
            (ret - rf_daily) / var.sqrt()
        }
    };

    let mut best = w.clone();
    let mut best_sharpe = sharpe(&w);

    for _ in 0..500 {
        let eps = 1e-6;
        let base = sharpe(&w);
        let grad: Vec<f64> = (0..n)
            .map(|i| {
                let mut bumped = w.clone();
                bumped[i] += eps;
                (sharpe(&bumped) - base) / eps
            })
            .collect();
        let mut candidate: Vec<f64> = w.iter().zip(&grad).map(|(wi, gi)| wi + step * gi).collect();
        candidate = match normalize_and_clamp(candidate, min_weight, max_weight) {
            Ok(c) => c,
            Err(_) => break,
        };
        let s = sharpe(&candidate);
        if s.is_finite() && s > best_sharpe {
            best_sharpe = s;
            best = candidate.clone();
        }
        w = candidate;
    }

    if !best_sharpe.is_finite() {
        return (equal_weight(n), true);
    }
    (best, false)
}

fn risk_parity(cov: &[Vec<f64>], min_weight: f64, max_weight: f64) -> (Vec<f64>, bool) {
    let n = cov.len();
    let mut w = equal_weight(n);

    for _ in 0..500 {
        let port_var = portfolio_variance(&w, cov);
        if port_var <= 1e-18 {
            return (equal_weight(n), true);
        }
        // marginal contribution: (Σw)_i ; risk contribution: w_i * (Σw)_i
        let sigma_w: Vec<f64> = (0..n)
            .map(|i| (0..n).map(|j| cov[i][j] * w[j]).sum::<f64>())
            .collect();
        let contrib: Vec<f64> = w.iter().zip(&sigma_w).map(|(wi, si)| wi * si).collect();
        let target = port_var / n as f64;

        // Cyclic coordinate-style update: nudge weights toward equalized
        // risk contribution, then re-project onto the simplex.
        let mut candidate = w.clone();
        for i in 0..n {
            if sigma_w[i].abs() > 1e-12 {
                let adjust = (target - contrib[i]) / sigma_w[i] * 0.1;
                candidate[i] = (candidate[i] + adjust).max(1e-9);
            }
        }
        candidate = match normalize_and_clamp(candidate, min_weight, max_weight) {
            Ok(c) => c,
            Err(_) => break,
        };
        w = candidate;
    }
    (w, false)
}

fn maximum_diversification(
    stdevs: &[f64],
    cov: &[Vec<f64>],
    min_weight: f64,
    max_weight: f64,
) -> (Vec<f64>, bool) {
    let n = stdevs.len();
    let mut w = equal_weight(n);

    let div_ratio = |w: &[f64]| -> f64 {
        let weighted_vol: f64 = w.iter().zip(stdevs).map(|(wi, si)| wi * si).sum();
        let port_vol = portfolio_variance(w, cov).sqrt();
        if port_vol <= 1e-18 {
            0.0
        } else {
            weighted_vol / port_vol
        }
    };

    let mut best = w.clone();
    let mut best_ratio = div_ratio(&w);

    for _ in 0..500 {
        let eps = 1e-6;
        let base = div_ratio(&w);
        let grad: Vec<f64> = (0..n)
            .map(|i| {
                let mut bumped = w.clone();
                bumped[i] += eps;
                (div_ratio(&bumped) - base) / eps
            })
            .collect();
        let mut candidate: Vec<f64> = w.iter().zip(&grad).map(|(wi, gi)| wi + 0.05 * gi).collect();
        candidate = match normalize_and_clamp(candidate, min_weight, max_weight) {
            Ok(c) => c,
            Err(_) => break,
        };
        let ratio = div_ratio(&candidate);
        if ratio.is_finite() && ratio > best_ratio {
            best_ratio = ratio;
            best = candidate.clone();
        }
        w = candidate;
    }

    if !best_ratio.is_finite() || best_ratio == 0.0 {
        return (equal_weight(n), true);
    }
    (best, false)
}

/// Run the configured optimization method over a daily-returns matrix and
/// produce annualized output metrics.
pub fn optimize(
    matrix: &ReturnsMatrix,
    config: &OptimizerConfig,
) -> Result<OptimizerOutput, OptimizerError> {
    let n = matrix.n();
    if n == 0 {
        return Err(OptimizerError::EmptyUniverse);
    }
    if config.max_weight * n as f64 < 1.0 - 1e-9 {
        return Err(OptimizerError::InfeasibleConstraints {
            n,
            max_weight: config.max_weight,
        });
    }

    let mean = matrix.mean_vector();
    let cov = matrix.covariance_matrix();
    let stdevs = matrix.stdevs();
    let rf_daily = config.risk_free_rate_annual / TRADING_DAYS_PER_YEAR;

    let (raw_weights, mut fell_back) = match config.method {
        OptimizationMethod::EqualWeight => (equal_weight(n), false),
        OptimizationMethod::InverseVolatility => inverse_volatility(&stdevs),
        OptimizationMethod::MinimumVariance => {
            minimize_variance(&cov, config.min_weight, config.max_weight)
        }
        OptimizationMethod::MaximumSharpe => {
            maximum_sharpe(&mean, &cov, rf_daily, config.min_weight, config.max_weight)
        }
        OptimizationMethod::RiskParity => risk_parity(&cov, config.min_weight, config.max_weight),
        OptimizationMethod::MaximumDiversification => {
            maximum_diversification(&stdevs, &cov, config.min_weight, config.max_weight)
        }
        OptimizationMethod::HierarchicalRiskParity => {
            hrp::hierarchical_risk_parity(matrix.symbols, &cov, n)
        }
    };

    let weights = match normalize_and_clamp(raw_weights, config.min_weight, config.max_weight) {
        Ok(w) => w,
        Err(e) => return Err(e),
    };

    if fell_back {
        warn!(method = ?config.method, "optimizer fell back to equal weight after numerical failure");
    }
    // Guard: a degenerate weights vector (e.g. HRP on < 3 assets) is itself
    // equal weight by construction, not a numerical failure — don't double count.
    if !fell_back && weights.iter().all(|w| (w - 1.0 / n as f64).abs() < 1e-9) {
        fell_back = false;
    }

    let expected_return_annual: f64 =
        weights.iter().zip(&mean).map(|(w, m)| w * m).sum::<f64>() * TRADING_DAYS_PER_YEAR;
    let variance_daily = portfolio_variance(&weights, &cov);
    let expected_volatility_annual = variance_daily.sqrt() * TRADING_DAYS_PER_YEAR.sqrt();
    let sharpe_ratio = if expected_volatility_annual > 0.0 {
        (expected_return_annual - config.risk_free_rate_annual) / expected_volatility_annual
    } else {
        0.0
    };

    let weighted_vol: f64 = weights.iter().zip(&stdevs).map(|(w, s)| w * s).sum();
    let port_vol_daily = variance_daily.sqrt();
    let diversification_ratio = if port_vol_daily > 1e-18 {
        weighted_vol / port_vol_daily
    } else {
        f64::NAN
    };

    let mut risk_contributions = HashMap::new();
    if variance_daily > 1e-18 {
        for (i, symbol) in matrix.symbols.iter().enumerate() {
            let sigma_w: f64 = (0..n).map(|j| cov[i][j] * weights[j]).sum();
            risk_contributions.insert(symbol.clone(), weights[i] * sigma_w / variance_daily);
        }
    } else {
        for symbol in matrix.symbols {
            risk_contributions.insert(symbol.clone(), 1.0 / n as f64);
        }
    }

    let weights_map = matrix
        .symbols
        .iter()
        .cloned()
        .zip(weights.iter().copied())
        .collect();

    Ok(OptimizerOutput {
        weights: weights_map,
        expected_return_annual,
        expected_volatility_annual,
        sharpe_ratio,
        diversification_ratio,
        risk_contributions,
        fell_back_to_equal_weight: fell_back,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols() -> Vec<String> {
        vec!["A".into(), "B".into(), "C".into()]
    }

    fn returns() -> Vec<Vec<f64>> {
        // three assets, mildly different vol, uncorrelated-ish synthetic data
        vec![
            vec![0.01, 0.02, -0.01],
            vec![-0.005, 0.01, 0.02],
            vec![0.015, -0.02, 0.005],
            vec![0.002, 0.03, -0.015],
            vec![-0.01, -0.01, 0.025],
            vec![0.008, 0.015, 0.0],
        ]
    }

    #[test]
    fn equal_weight_sums_to_one_and_is_uniform() {
        let syms = symbols();
        let rets = returns();
        let matrix = ReturnsMatrix {
            symbols: &syms,
            returns: &rets,
        };
        let config = OptimizerConfig::default();
        let out = optimize(&matrix, &config).unwrap();
        let sum: f64 = out.weights.values().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        for w in out.weights.values() {
            assert!((w - 1.0 / 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn all_seven_methods_produce_valid_weights() {
        let syms = symbols();
        let rets = returns();
        let matrix = ReturnsMatrix {
            symbols: &syms,
            returns: &rets,
        };
        for method in [
            OptimizationMethod::EqualWeight,
            OptimizationMethod::InverseVolatility,
            OptimizationMethod::MinimumVariance,
            OptimizationMethod::MaximumSharpe,
            OptimizationMethod::RiskParity,
            OptimizationMethod::MaximumDiversification,
            OptimizationMethod::HierarchicalRiskParity,
        ] {
            let config = OptimizerConfig {
                method,
                ..Default::default()
            };
            let out = optimize(&matrix, &config).unwrap();
            let sum: f64 = out.weights.values().sum();
            assert!((sum - 1.0).abs() < 1e-6, "{:?}: sum={}", method, sum);
            for w in out.weights.values() {
                assert!(*w >= -1e-9 && *w <= 1.0 + 1e-9, "{:?}: w={}", method, w);
            }
        }
    }

    #[test]
    fn infeasible_constraints_rejected() {
        let syms = symbols();
        let rets = returns();
        let matrix = ReturnsMatrix {
            symbols: &syms,
            returns: &rets,
        };
        let config = OptimizerConfig {
            max_weight: 0.2, // 3 * 0.2 = 0.6 < 1.0
            ..Default::default()
        };
        let err = optimize(&matrix, &config).unwrap_err();
        assert!(matches!(err, OptimizerError::InfeasibleConstraints { .. }));
    }

    #[test]
    fn weight_bounds_respected_with_tight_max() {
        let syms = symbols();
        let rets = returns();
        let matrix = ReturnsMatrix {
            symbols: &syms,
            returns: &rets,
        };
        let config = OptimizerConfig {
            method: OptimizationMethod::MaximumSharpe,
            max_weight: 0.5,
            min_weight: 0.1,
            ..Default::default()
        };
        let out = optimize(&matrix, &config).unwrap();
        for w in out.weights.values() {
            assert!(*w <= 0.5 + 1e-6 && *w >= 0.1 - 1e-6);
        }
    }

    #[test]
    fn hrp_falls_back_to_equal_weight_below_three_assets() {
        let syms = vec!["A".to_string(), "B".to_string()];
        let rets = vec![
            vec![0.01, 0.02],
            vec![-0.01, 0.01],
            vec![0.02, -0.01],
            vec![0.0, 0.03],
        ];
        let matrix = ReturnsMatrix {
            symbols: &syms,
            returns: &rets,
        };
        let config = OptimizerConfig {
            method: OptimizationMethod::HierarchicalRiskParity,
            ..Default::default()
        };
        let out = optimize(&matrix, &config).unwrap();
        assert!(out.fell_back_to_equal_weight);
        for w in out.weights.values() {
            assert!((w - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn annualization_happens_exactly_once() {
        // mean daily return 0.000408, daily std 0.007 (constructed directly,
        // not from a returns matrix) — the canonical regression case.
        let syms = vec!["A".to_string()];
        let n = 252;
        let rets: Vec<Vec<f64>> = (0..n).map(|_| vec![0.000408]).collect();
        // overwrite with a series carrying the target stdev by construction
        let mut series = Vec::with_capacity(n);
        for i in 0..n {
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            series.push(vec![0.000408 + sign * 0.007]);
        }
        let _ = rets;
        let matrix = ReturnsMatrix {
            symbols: &syms,
            returns: &series,
        };
        let config = OptimizerConfig {
            risk_free_rate_annual: 0.02,
            ..Default::default()
        };
        let out = optimize(&matrix, &config).unwrap();
        assert!((out.expected_return_annual - 0.000408 * 252.0).abs() < 1e-6);
    }
}
