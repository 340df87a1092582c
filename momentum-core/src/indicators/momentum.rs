//! Momentum calculators (spec §4.2): absolute percentage return,
//! volatility-adjusted, and moving-average crossover momentum.
//!
//! All three are pure functions of a symbol's own bar history and exclude
//! undefined scores (insufficient history, zero/undefined denominator) from
//! downstream ranking by returning `NaN`.

use super::{Indicator, Sma};
use crate::domain::Bar;

/// Absolute return momentum: `close[t] / close[t-period] - 1`.
///
/// Off-by-one note: the value at index `i` references `bars[i - period]`, so
/// a window of `period + 1` bars (inclusive of the current bar) is required
/// for the score at the last bar in the window to be defined. This mirrors
/// the spec's documented off-by-one hazard around `pct_change(N)`.
#[derive(Debug, Clone)]
pub struct PctMomentum {
    period: usize,
    name: String,
}

impl PctMomentum {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "momentum period must be >= 1");
        Self {
            period,
            name: format!("pct_momentum_{period}"),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for PctMomentum {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        for i in self.period..n {
            let prev = bars[i - self.period].close;
            let curr = bars[i].close;
            if prev.is_nan() || curr.is_nan() || prev == 0.0 {
                result[i] = f64::NAN;
            } else {
                result[i] = curr / prev - 1.0;
            }
        }
        result
    }
}

/// Daily returns series: `close[t] / close[t-1] - 1`, NaN at index 0.
fn daily_returns(bars: &[Bar]) -> Vec<f64> {
    let mut returns = vec![f64::NAN; bars.len()];
    for i in 1..bars.len() {
        let prev = bars[i - 1].close;
        let curr = bars[i].close;
        returns[i] = if prev.is_nan() || curr.is_nan() || prev == 0.0 {
            f64::NAN
        } else {
            curr / prev - 1.0
        };
    }
    returns
}

/// Rolling sample standard deviation (ddof = 1) of a returns series over
/// `window` trailing observations, NaN until `window` observations are
/// available or if any observation in the window is NaN.
fn rolling_std(returns: &[f64], window: usize) -> Vec<f64> {
    let n = returns.len();
    let mut result = vec![f64::NAN; n];
    if window < 2 {
        return result;
    }
    for i in (window - 1)..n {
        let slice = &returns[(i + 1 - window)..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        let mean = slice.iter().sum::<f64>() / window as f64;
        let var = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (window as f64 - 1.0);
        result[i] = var.sqrt();
    }
    result
}

/// Volatility-adjusted momentum: `absolute_momentum / rolling_std(returns, period)`.
///
/// Undefined (NaN) when the denominator is zero or undefined, per spec.
#[derive(Debug, Clone)]
pub struct VolAdjustedMomentum {
    period: usize,
    name: String,
}

impl VolAdjustedMomentum {
    pub fn new(period: usize) -> Self {
        assert!(period >= 2, "vol-adjusted momentum period must be >= 2");
        Self {
            period,
            name: format!("vol_adj_momentum_{period}"),
        }
    }
}

impl Indicator for VolAdjustedMomentum {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let abs_mom = PctMomentum::new(self.period).compute(bars);
        let returns = daily_returns(bars);
        let vol = rolling_std(&returns, self.period);

        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        for i in 0..n {
            let denom = vol[i];
            if denom.is_nan() || denom == 0.0 || abs_mom[i].is_nan() {
                continue;
            }
            result[i] = abs_mom[i] / denom;
        }
        result
    }
}

/// Moving-average crossover momentum: `MA_fast / MA_slow - 1`.
#[derive(Debug, Clone)]
pub struct MaCrossoverMomentum {
    fast: usize,
    slow: usize,
    name: String,
}

impl MaCrossoverMomentum {
    pub fn new(fast: usize, slow: usize) -> Self {
        assert!(fast >= 1 && slow > fast, "require 1 <= fast < slow");
        Self {
            fast,
            slow,
            name: format!("ma_crossover_{fast}_{slow}"),
        }
    }
}

impl Indicator for MaCrossoverMomentum {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.slow.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let fast_ma = Sma::new(self.fast).compute(bars);
        let slow_ma = Sma::new(self.slow).compute(bars);
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        for i in 0..n {
            if fast_ma[i].is_nan() || slow_ma[i].is_nan() || slow_ma[i] == 0.0 {
                continue;
            }
            result[i] = fast_ma[i] / slow_ma[i] - 1.0;
        }
        result
    }
}
