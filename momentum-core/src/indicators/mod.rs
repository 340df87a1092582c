//! Momentum calculators and small supporting indicators.
//!
//! All indicators implement the `Indicator` trait and are precomputed over a
//! symbol's full bar history before the engine loop starts.

pub mod momentum;
pub mod sma;

pub use momentum::{MaCrossoverMomentum, PctMomentum, VolAdjustedMomentum};
pub use sma::Sma;

/// An indicator over a single symbol's bar history.
pub trait Indicator {
    fn name(&self) -> &str;

    /// Number of prior bars required before the first non-NaN output.
    fn lookback(&self) -> usize;

    /// Compute the indicator series, one value per input bar. Values before
    /// `lookback()` bars have elapsed are NaN.
    fn compute(&self, bars: &[crate::domain::Bar]) -> Vec<f64>;
}

/// Create synthetic bars from close prices for testing.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let high = open.max(close) + 1.0;
            let low = open.min(close) - 1.0;
            Bar {
                symbol: "TEST".to_string(),
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high,
                low,
                close,
                volume: 1000,
                adj_close: close,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
