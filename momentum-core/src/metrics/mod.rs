//! Performance metrics (spec §4.7): pure functions over an equity curve and
//! trade log. No dependency on the engine or runner — metrics are computed
//! after a run completes, never inside the bar loop.
//!
//! The annualization rule is applied exactly once here: daily statistics are
//! multiplied by 252 (returns) or √252 (volatility); nothing downstream may
//! re-annualize.

use crate::domain::Trade;
use crate::engine::EquityPoint;
use chrono::Datelike;
use serde::{Deserialize, Serialize};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const DAYS_PER_YEAR: f64 = 365.25;
const MIN_YEARS_FOR_CAGR: f64 = 0.003;
const MIN_OBSERVATIONS_FOR_MONTHLY: usize = 20;
const CAGR_SUSPICIOUS_RANGE: std::ops::RangeInclusive<f64> = -1.0..=100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub cagr: f64,
    pub annual_return: f64,
    pub annual_volatility: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub max_drawdown: f64,
    pub calmar: f64,
    pub best_month: f64,
    pub worst_month: f64,
    pub positive_months: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub trade_count: usize,
}

impl PerformanceMetrics {
    /// Aliases exposed for consumer compatibility (spec §4.7).
    pub fn annualized_return(&self) -> f64 {
        self.annual_return
    }

    pub fn volatility(&self) -> f64 {
        self.annual_volatility
    }

    fn empty() -> Self {
        Self {
            total_return: 0.0,
            cagr: 0.0,
            annual_return: 0.0,
            annual_volatility: 0.0,
            sharpe: 0.0,
            sortino: 0.0,
            max_drawdown: 0.0,
            calmar: 0.0,
            best_month: 0.0,
            worst_month: 0.0,
            positive_months: 0.0,
            win_rate: 0.0,
            profit_factor: 0.0,
            avg_win: 0.0,
            avg_loss: 0.0,
            trade_count: 0,
        }
    }
}

/// Daily returns: `r_t = equity_t / equity_{t-1} - 1`. The first bar has no
/// defined return and is dropped.
fn daily_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| {
            if w[0].equity > 0.0 {
                w[1].equity / w[0].equity - 1.0
            } else {
                0.0
            }
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample standard deviation (ddof = 1).
fn stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let mut peak = equity_curve[0].equity;
    let mut worst = 0.0_f64;
    for point in equity_curve {
        peak = peak.max(point.equity);
        if peak > 0.0 {
            worst = worst.min(point.equity / peak - 1.0);
        }
    }
    worst
}

/// Per-month compound returns via month-end resampling.
fn monthly_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    if equity_curve.len() < MIN_OBSERVATIONS_FOR_MONTHLY {
        return Vec::new();
    }
    let mut month_ends: Vec<f64> = Vec::new();
    for (i, point) in equity_curve.iter().enumerate() {
        let is_month_end = match equity_curve.get(i + 1) {
            Some(next) => {
                (next.date.year(), next.date.month()) != (point.date.year(), point.date.month())
            }
            None => true,
        };
        if is_month_end {
            month_ends.push(point.equity);
        }
    }
    month_ends
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

/// Compute the full metrics set for a completed backtest.
///
/// Returns an all-zero `PerformanceMetrics` when the equity curve is too
/// short to define any statistic (spec: "an empty-metrics struct is
/// returned when the input is too short").
pub fn compute(equity_curve: &[EquityPoint], trades: &[Trade], risk_free_rate_annual: f64) -> PerformanceMetrics {
    if equity_curve.len() < 2 {
        return PerformanceMetrics::empty();
    }

    let first = equity_curve.first().unwrap();
    let last = equity_curve.last().unwrap();

    let total_return = if first.equity != 0.0 {
        last.equity / first.equity - 1.0
    } else {
        0.0
    };

    let days = (last.date - first.date).num_days();
    let years = days as f64 / DAYS_PER_YEAR;
    let cagr = if years < MIN_YEARS_FOR_CAGR || first.equity <= 0.0 || last.equity <= 0.0 {
        0.0
    } else {
        (last.equity / first.equity).powf(1.0 / years) - 1.0
    };
    if !CAGR_SUSPICIOUS_RANGE.contains(&cagr) {
        tracing::warn!(cagr, "computed CAGR outside expected [-1, 100] range");
    }

    let returns = daily_returns(equity_curve);
    let annual_return = mean(&returns) * TRADING_DAYS_PER_YEAR;
    let annual_volatility = stdev(&returns) * TRADING_DAYS_PER_YEAR.sqrt();

    let sharpe = if annual_volatility > 0.0 {
        (annual_return - risk_free_rate_annual) / annual_volatility
    } else {
        0.0
    };

    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let downside_annual = stdev(&downside) * TRADING_DAYS_PER_YEAR.sqrt();
    let sortino = if downside_annual > 0.0 {
        (annual_return - risk_free_rate_annual) / downside_annual
    } else {
        0.0
    };

    let max_dd = max_drawdown(equity_curve);
    let calmar = if max_dd < 0.0 { cagr / max_dd.abs() } else { 0.0 };

    let monthly = monthly_returns(equity_curve);
    let (best_month, worst_month, positive_months) = if monthly.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        let best = monthly.iter().copied().fold(f64::MIN, f64::max);
        let worst = monthly.iter().copied().fold(f64::MAX, f64::min);
        let positive = monthly.iter().filter(|r| **r > 0.0).count();
        (best, worst, positive as f64 / monthly.len() as f64 * 100.0)
    };

    let closing: Vec<&Trade> = trades.iter().filter(|t| t.is_closing()).collect();
    let win_rate = if closing.is_empty() {
        0.0
    } else {
        closing.iter().filter(|t| t.is_winner()).count() as f64 / closing.len() as f64
    };
    let gross_profit: f64 = closing
        .iter()
        .filter_map(|t| t.pnl)
        .filter(|p| *p > 0.0)
        .sum();
    let gross_loss: f64 = closing
        .iter()
        .filter_map(|t| t.pnl)
        .filter(|p| *p < 0.0)
        .map(f64::abs)
        .sum();
    let profit_factor = if gross_loss > 1e-10 {
        (gross_profit / gross_loss).min(100.0)
    } else if gross_profit > 0.0 {
        100.0
    } else {
        0.0
    };
    let wins: Vec<f64> = closing.iter().filter_map(|t| t.pnl).filter(|p| *p > 0.0).collect();
    let losses: Vec<f64> = closing.iter().filter_map(|t| t.pnl).filter(|p| *p < 0.0).collect();
    let avg_win = mean(&wins);
    let avg_loss = mean(&losses);

    PerformanceMetrics {
        total_return,
        cagr,
        annual_return,
        annual_volatility,
        sharpe,
        sortino,
        max_drawdown: max_dd,
        calmar,
        best_month,
        worst_month,
        positive_months,
        win_rate,
        profit_factor,
        avg_win,
        avg_loss,
        trade_count: closing.len(),
    }
}
