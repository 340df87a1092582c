//! Momentum strategy: absolute and dual-momentum variants (spec §4.3).
//!
//! A strategy never reads or writes portfolio state — its only inputs are a
//! historical bar window per symbol and the prior rebalance date, and its
//! only output is a list of `Signal`s. The engine is solely responsible for
//! applying those signals to the portfolio.

use crate::domain::Symbol;
use crate::indicators::{Indicator, PctMomentum};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceFrequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

impl RebalanceFrequency {
    /// Whether `current` falls in a new rebalance period relative to `last`.
    pub fn should_rebalance(self, current: NaiveDate, last: Option<NaiveDate>) -> bool {
        let Some(last) = last else { return true };
        match self {
            RebalanceFrequency::Daily => true,
            RebalanceFrequency::Weekly => current.iso_week() != last.iso_week(),
            RebalanceFrequency::Monthly => {
                (current.year(), current.month()) != (last.year(), last.month())
            }
            RebalanceFrequency::Quarterly => {
                let q = |d: NaiveDate| (d.year(), (d.month0() / 3) + 1);
                q(current) != q(last)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrengthMethod {
    Binary,
    Linear { scale_range: ScaledFloat },
    Proportional,
    MomentumRatio,
}

/// A float wrapper with `Eq`/`Hash` via bit pattern, so `StrengthMethod` can
/// derive `PartialEq` for config-equality/hash-based caching.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScaledFloat(pub f64);

impl PartialEq for ScaledFloat {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}
impl Eq for ScaledFloat {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumStrategyConfig {
    pub lookback_period: usize,
    pub rebalance_frequency: RebalanceFrequency,
    pub position_count: usize,
    pub absolute_threshold: f64,
    pub safe_asset: Option<Symbol>,
    pub strength_method: StrengthMethod,
    pub use_volatility_adjustment: bool,
    /// When `Some`, the strategy uses the dual-momentum variant: the
    /// absolute filter is applied to `asset_return - safe_asset_return`.
    pub dual_momentum: bool,
}

impl Default for MomentumStrategyConfig {
    fn default() -> Self {
        Self {
            lookback_period: 252,
            rebalance_frequency: RebalanceFrequency::Monthly,
            position_count: 3,
            absolute_threshold: 0.0,
            safe_asset: None,
            strength_method: StrengthMethod::Binary,
            use_volatility_adjustment: false,
            dual_momentum: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub date: NaiveDate,
    pub symbol: Symbol,
    /// Always +1 in this spec (no short selling); 0 is never emitted — an
    /// unselected symbol simply has no `Signal`.
    pub direction: i8,
    pub strength: f64,
}

/// Momentum strategy. Owns only configuration, never portfolio state.
#[derive(Debug, Clone)]
pub struct MomentumStrategy {
    config: MomentumStrategyConfig,
}

impl MomentumStrategy {
    pub fn new(config: MomentumStrategyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MomentumStrategyConfig {
        &self.config
    }

    /// Minimum number of prior bars required before the first signal.
    pub fn required_history(&self) -> usize {
        self.config.lookback_period
    }

    pub fn should_rebalance(&self, current: NaiveDate, last: Option<NaiveDate>) -> bool {
        self.config.rebalance_frequency.should_rebalance(current, last)
    }

    /// Compute signals from a window of bar slices, one per symbol, each
    /// ending at the current rebalance date (inclusive). `windows` must not
    /// include the safe asset unless it is also a candidate; safe-asset
    /// fallback is handled internally via `safe_asset_window`.
    ///
    /// Returns the signal list and, if the safe asset was requested but not
    /// present in `safe_asset_window`, a warning to be logged by the caller
    /// (the strategy itself never logs — it is a pure function).
    pub fn generate_signals(
        &self,
        date: NaiveDate,
        windows: &std::collections::HashMap<Symbol, Vec<crate::domain::Bar>>,
        safe_asset_window: Option<&[crate::domain::Bar]>,
    ) -> (Vec<Signal>, Option<SafeAssetWarning>) {
        let period = self.config.lookback_period;
        let indicator = PctMomentum::new(period);

        let safe_asset_return = if self.config.dual_momentum {
            safe_asset_window.and_then(|bars| {
                let scores = indicator.compute(bars);
                scores.last().copied().filter(|v| !v.is_nan())
            })
        } else {
            None
        };

        let mut scored: Vec<(Symbol, f64)> = Vec::new();
        let mut symbols: Vec<&Symbol> = windows.keys().collect();
        symbols.sort();
        for symbol in symbols {
            let bars = &windows[symbol];
            let scores = indicator.compute(bars);
            let Some(raw_score) = scores.last().copied().filter(|v| !v.is_nan()) else {
                continue;
            };

            let relative_score = match safe_asset_return {
                Some(safe_ret) => raw_score - safe_ret,
                None => raw_score,
            };

            // Dual momentum requires both the relative filter and the
            // asset's own absolute return to be positive.
            let passes = if self.config.dual_momentum {
                relative_score > self.config.absolute_threshold && raw_score > 0.0
            } else {
                raw_score > self.config.absolute_threshold
            };
            if !passes {
                continue;
            }
            scored.push((symbol.clone(), raw_score));
        }

        if scored.is_empty() {
            return match &self.config.safe_asset {
                Some(safe) => match safe_asset_window {
                    Some(_) => (
                        vec![Signal {
                            date,
                            symbol: safe.clone(),
                            direction: 1,
                            strength: 1.0,
                        }],
                        None,
                    ),
                    None => (
                        Vec::new(),
                        Some(SafeAssetWarning {
                            symbol: safe.clone(),
                        }),
                    ),
                },
                None => (Vec::new(), None),
            };
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.config.position_count);

        let signals = apply_strength(
            &scored,
            &self.config.strength_method,
            date,
            self.config.absolute_threshold,
        );
        (signals, None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeAssetWarning {
    pub symbol: Symbol,
}

fn apply_strength(
    scored: &[(Symbol, f64)],
    method: &StrengthMethod,
    date: NaiveDate,
    absolute_threshold: f64,
) -> Vec<Signal> {
    match method {
        StrengthMethod::Binary => scored
            .iter()
            .map(|(symbol, _)| Signal {
                date,
                symbol: symbol.clone(),
                direction: 1,
                strength: 1.0,
            })
            .collect(),
        StrengthMethod::Linear { scale_range } => {
            let scale = scale_range.0.max(f64::EPSILON);
            scored
                .iter()
                .map(|(symbol, score)| {
                    let raw = (score - absolute_threshold) / scale;
                    Signal {
                        date,
                        symbol: symbol.clone(),
                        direction: 1,
                        strength: raw.clamp(0.0, 1.0),
                    }
                })
                .collect()
        }
        StrengthMethod::Proportional => {
            let total: f64 = scored.iter().map(|(_, s)| s.max(0.0)).sum();
            scored
                .iter()
                .map(|(symbol, score)| {
                    let strength = if total > 0.0 {
                        (score.max(0.0) / total).clamp(0.0, 1.0)
                    } else {
                        1.0 / scored.len() as f64
                    };
                    Signal {
                        date,
                        symbol: symbol.clone(),
                        direction: 1,
                        strength,
                    }
                })
                .collect()
        }
        StrengthMethod::MomentumRatio => {
            let max_score = scored
                .iter()
                .map(|(_, s)| *s)
                .fold(f64::MIN, f64::max)
                .max(f64::EPSILON);
            scored
                .iter()
                .map(|(symbol, score)| Signal {
                    date,
                    symbol: symbol.clone(),
                    direction: 1,
                    strength: (score / max_score).clamp(0.0, 1.0),
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use std::collections::HashMap;

    fn bars_with_return(symbol: &str, start: f64, daily_ret: f64, n: usize) -> Vec<Bar> {
        let base_date = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let mut price = start;
        (0..n)
            .map(|i| {
                if i > 0 {
                    price *= 1.0 + daily_ret;
                }
                Bar {
                    symbol: symbol.to_string(),
                    date: base_date + chrono::Duration::days(i as i64),
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume: 1000,
                    adj_close: price,
                }
            })
            .collect()
    }

    #[test]
    fn rebalance_cadence_monthly() {
        let freq = RebalanceFrequency::Monthly;
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 20).unwrap();
        let d3 = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert!(!freq.should_rebalance(d2, Some(d1)));
        assert!(freq.should_rebalance(d3, Some(d1)));
    }

    #[test]
    fn rebalance_always_true_on_first_call() {
        let freq = RebalanceFrequency::Quarterly;
        assert!(freq.should_rebalance(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), None));
    }

    #[test]
    fn absolute_momentum_selects_top_n_positive() {
        let mut config = MomentumStrategyConfig {
            lookback_period: 10,
            position_count: 1,
            ..Default::default()
        };
        config.absolute_threshold = 0.0;
        let strategy = MomentumStrategy::new(config);

        let mut windows = HashMap::new();
        windows.insert("A".to_string(), bars_with_return("A", 100.0, 0.01, 11));
        windows.insert("B".to_string(), bars_with_return("B", 100.0, 0.02, 11));

        let (signals, warning) = strategy.generate_signals(
            NaiveDate::from_ymd_opt(2023, 1, 12).unwrap(),
            &windows,
            None,
        );
        assert!(warning.is_none());
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].symbol, "B");
        assert_eq!(signals[0].strength, 1.0);
    }

    #[test]
    fn safe_asset_fallback_when_nothing_passes() {
        let config = MomentumStrategyConfig {
            lookback_period: 10,
            position_count: 2,
            safe_asset: Some("BOND".to_string()),
            absolute_threshold: 0.0,
            ..Default::default()
        };
        let strategy = MomentumStrategy::new(config);

        let mut windows = HashMap::new();
        windows.insert("A".to_string(), bars_with_return("A", 100.0, -0.01, 11));
        let safe_bars = bars_with_return("BOND", 100.0, 0.0001, 11);

        let (signals, warning) = strategy.generate_signals(
            NaiveDate::from_ymd_opt(2023, 1, 12).unwrap(),
            &windows,
            Some(&safe_bars),
        );
        assert!(warning.is_none());
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].symbol, "BOND");
    }

    #[test]
    fn safe_asset_missing_produces_warning_not_silent_success() {
        let config = MomentumStrategyConfig {
            lookback_period: 10,
            position_count: 2,
            safe_asset: Some("BOND".to_string()),
            absolute_threshold: 0.0,
            ..Default::default()
        };
        let strategy = MomentumStrategy::new(config);

        let mut windows = HashMap::new();
        windows.insert("A".to_string(), bars_with_return("A", 100.0, -0.01, 11));

        let (signals, warning) = strategy.generate_signals(
            NaiveDate::from_ymd_opt(2023, 1, 12).unwrap(),
            &windows,
            None,
        );
        assert!(signals.is_empty());
        assert_eq!(
            warning,
            Some(SafeAssetWarning {
                symbol: "BOND".to_string()
            })
        );
    }

    #[test]
    fn linear_strength_matches_threshold_and_scale_formula() {
        // strength = clamp((score - absolute_threshold) / scale_range, 0, 1)
        let method = StrengthMethod::Linear {
            scale_range: ScaledFloat(0.1),
        };
        let scored = vec![("A".to_string(), 0.05), ("B".to_string(), 0.10)];
        let signals = apply_strength(
            &scored,
            &method,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            0.0,
        );

        assert!((signals[0].strength - 0.5).abs() < 1e-12);
        assert!((signals[1].strength - 1.0).abs() < 1e-12);
    }

    #[test]
    fn linear_strength_shifts_with_absolute_threshold() {
        // Same scores, a higher threshold should lower every strength by
        // the same amount (scaled), since the formula subtracts the
        // threshold directly rather than some per-call minimum.
        let method = StrengthMethod::Linear {
            scale_range: ScaledFloat(0.1),
        };
        let scored = vec![("A".to_string(), 0.05), ("B".to_string(), 0.10)];

        let low_threshold = apply_strength(
            &scored,
            &method,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            0.0,
        );
        let high_threshold = apply_strength(
            &scored,
            &method,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            0.05,
        );

        assert!((low_threshold[0].strength - 0.5).abs() < 1e-12);
        assert!((high_threshold[0].strength - 0.0).abs() < 1e-12);
        assert!((high_threshold[1].strength - 0.5).abs() < 1e-12);
    }

    #[test]
    fn proportional_strengths_sum_to_one() {
        let scored = vec![
            ("A".to_string(), 0.10),
            ("B".to_string(), 0.05),
            ("C".to_string(), 0.15),
        ];
        let signals = apply_strength(
            &scored,
            &StrengthMethod::Proportional,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            0.0,
        );
        let sum: f64 = signals.iter().map(|s| s.strength).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn momentum_ratio_best_symbol_has_strength_one() {
        let scored = vec![("A".to_string(), 0.10), ("B".to_string(), 0.05)];
        let signals = apply_strength(
            &scored,
            &StrengthMethod::MomentumRatio,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            0.0,
        );
        assert_eq!(signals[0].strength, 1.0);
        assert!((signals[1].strength - 0.5).abs() < 1e-9);
    }

    #[test]
    fn all_strengths_bounded_in_unit_interval() {
        for method in [
            StrengthMethod::Binary,
            StrengthMethod::Linear {
                scale_range: ScaledFloat(0.2),
            },
            StrengthMethod::Proportional,
            StrengthMethod::MomentumRatio,
        ] {
            let scored = vec![
                ("A".to_string(), 0.30),
                ("B".to_string(), 0.02),
                ("C".to_string(), 0.15),
            ];
            let signals = apply_strength(
                &scored,
                &method,
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                0.0,
            );
            for s in signals {
                assert!(s.strength >= 0.0 && s.strength <= 1.0, "{:?}", s);
            }
        }
    }
}
