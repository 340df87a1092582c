//! The simulation engine's per-bar loop (spec §4.6).
//!
//! Single-threaded, strictly sequential over `panel.dates`. All map
//! iteration is sorted by symbol so that identical inputs reproduce
//! byte-identical outputs.

use crate::data::AlignedPanel;
use crate::domain::{Bar, Order, Portfolio};
use crate::engine::accounting::{execute_order, mark_to_market, EquityPoint, ExecutionOutcome};
use crate::engine::state::{BacktestResult, EngineConfig, SkippedSignal};
use crate::optimizer::{self, OptimizationMethod, OptimizerError, ReturnsMatrix};
use crate::risk::{self, RiskError};
use crate::strategy::MomentumStrategy;
use chrono::NaiveDate;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("panel has {available} bars, strategy requires at least {required}")]
    InsufficientHistory { available: usize, required: usize },
    #[error("optimizer error: {0}")]
    Optimizer(#[from] OptimizerError),
    #[error("risk manager error: {0}")]
    Risk(#[from] RiskError),
}

fn daily_returns(bars: &[Bar]) -> Vec<f64> {
    bars.windows(2)
        .map(|w| w[1].close / w[0].close - 1.0)
        .collect()
}

/// Weights derived purely from signal strength: `w_i = strength_i / Σ strength`.
fn strength_weights(signals: &[crate::strategy::Signal]) -> HashMap<String, f64> {
    let total: f64 = signals.iter().map(|s| s.strength).sum();
    if total <= 0.0 {
        let n = signals.len().max(1) as f64;
        return signals.iter().map(|s| (s.symbol.clone(), 1.0 / n)).collect();
    }
    signals
        .iter()
        .map(|s| (s.symbol.clone(), s.strength / total))
        .collect()
}

/// Run a full backtest: `strategy` over `panel`, governed by `config`.
pub fn run(
    strategy: &MomentumStrategy,
    panel: &AlignedPanel,
    config: &EngineConfig,
) -> Result<BacktestResult, EngineError> {
    let required_history = strategy.required_history();
    if panel.len() < required_history + 1 {
        return Err(EngineError::InsufficientHistory {
            available: panel.len(),
            required: required_history + 1,
        });
    }

    let safe_asset = strategy.config().safe_asset.clone();
    if let Some(safe) = &safe_asset {
        if !panel.symbols.contains(safe) {
            warn!(
                symbol = %safe,
                "safe asset configured but absent from the aligned panel; defensive \
                 rebalances will be skipped and the portfolio will sit in cash"
            );
        }
    }

    let mut portfolio = Portfolio::new(config.initial_capital);
    let mut equity_curve = Vec::with_capacity(panel.len());
    let mut trades = Vec::new();
    let mut skipped_signals = Vec::new();
    let mut last_rebalance_t: Option<NaiveDate> = None;
    let mut rebalance_count = 0usize;
    let mut pending: VecDeque<(usize, Vec<Order>)> = VecDeque::new();

    for i in 0..panel.len() {
        let t = panel.dates[i];
        let prices: HashMap<String, f64> = panel
            .symbols
            .iter()
            .filter_map(|sym| panel.close(sym, i).map(|c| (sym.clone(), c)))
            .collect();

        mark_to_market(&mut portfolio, &prices);

        while let Some((due_at, _)) = pending.front() {
            if *due_at != i {
                break;
            }
            let (_, orders) = pending.pop_front().unwrap();
            execute_orders(&mut portfolio, &orders, &prices, config, t, &mut trades);
        }

        let equity = portfolio.equity(&prices);
        equity_curve.push(EquityPoint { date: t, equity });

        if i < required_history {
            continue;
        }
        if !strategy.should_rebalance(t, last_rebalance_t) {
            continue;
        }

        let window_start = i.saturating_sub(required_history);
        let mut windows: HashMap<String, Vec<Bar>> = HashMap::new();
        for symbol in &panel.symbols {
            if safe_asset.as_deref() == Some(symbol.as_str()) {
                continue;
            }
            if let Some(series) = panel.series(symbol) {
                windows.insert(symbol.clone(), series[window_start..=i].to_vec());
            }
        }
        let safe_window: Option<Vec<Bar>> = safe_asset.as_ref().and_then(|safe| {
            panel
                .series(safe)
                .map(|series| series[window_start..=i].to_vec())
        });

        let (signals, safe_warning) =
            strategy.generate_signals(t, &windows, safe_window.as_deref());

        if let Some(warning) = safe_warning {
            warn!(
                symbol = %warning.symbol,
                date = %t,
                "SafeAssetUnavailable: defensive signal could not be executed, portfolio remains in cash"
            );
            skipped_signals.push(SkippedSignal {
                date: t,
                symbol: warning.symbol,
                reason: "safe asset unavailable in panel".to_string(),
            });
        }

        last_rebalance_t = Some(t);
        rebalance_count += 1;

        if signals.is_empty() {
            continue;
        }

        let valid_signals: Vec<_> = signals
            .into_iter()
            .filter(|s| {
                let in_panel = panel.symbols.contains(&s.symbol)
                    || safe_asset.as_deref() == Some(s.symbol.as_str());
                if !in_panel {
                    warn!(symbol = %s.symbol, date = %t, "signal references a symbol absent from the panel");
                    skipped_signals.push(SkippedSignal {
                        date: t,
                        symbol: s.symbol.clone(),
                        reason: "symbol not in panel".to_string(),
                    });
                }
                in_panel
            })
            .collect();

        if valid_signals.is_empty() {
            continue;
        }

        let weights = if config.optimizer.method == OptimizationMethod::EqualWeight {
            strength_weights(&valid_signals)
        } else {
            let mut symbols: Vec<String> = valid_signals.iter().map(|s| s.symbol.clone()).collect();
            symbols.sort();
            symbols.dedup();
            let returns: Vec<Vec<f64>> = {
                let per_symbol: Vec<Vec<f64>> = symbols
                    .iter()
                    .map(|sym| {
                        windows
                            .get(sym)
                            .or(safe_window.as_ref().filter(|_| safe_asset.as_deref() == Some(sym.as_str())))
                            .map(|bars| daily_returns(bars))
                            .unwrap_or_default()
                    })
                    .collect();
                let len = per_symbol.iter().map(|r| r.len()).min().unwrap_or(0);
                (0..len)
                    .map(|row| per_symbol.iter().map(|r| r[row]).collect())
                    .collect()
            };
            let matrix = ReturnsMatrix {
                symbols: &symbols,
                returns: &returns,
            };
            match optimizer::optimize(&matrix, &config.optimizer) {
                Ok(out) => out.weights,
                Err(err) => {
                    warn!(error = %err, date = %t, "optimizer failed, falling back to signal-strength weights");
                    strength_weights(&valid_signals)
                }
            }
        };

        let orders = risk::size_orders(
            &portfolio,
            &weights,
            &prices,
            &config.assets,
            equity,
            &config.risk,
        )?;

        if config.execution.execution_delay == 0 {
            execute_orders(&mut portfolio, &orders, &prices, config, t, &mut trades);
        } else {
            let target = i + config.execution.execution_delay;
            if target < panel.len() {
                pending.push_back((target, orders));
            }
            // a delayed fill landing past the end of the panel is dropped per spec §9.
        }
    }

    let final_equity = equity_curve.last().map(|p| p.equity).unwrap_or(config.initial_capital);

    Ok(BacktestResult {
        equity_curve,
        trades,
        skipped_signals,
        rebalance_count,
        final_equity,
    })
}

fn execute_orders(
    portfolio: &mut Portfolio,
    orders: &[Order],
    prices: &HashMap<String, f64>,
    config: &EngineConfig,
    date: NaiveDate,
    trades: &mut Vec<crate::domain::Trade>,
) {
    let mut sorted_orders: Vec<&Order> = orders.iter().collect();
    sorted_orders.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    for order in sorted_orders {
        let Some(&close_price) = prices.get(&order.symbol) else {
            warn!(symbol = %order.symbol, date = %date, "order references symbol with no price on this bar, skipped");
            continue;
        };
        let allows_fractional = config
            .assets
            .get(&order.symbol)
            .map(|a| a.allows_fractional())
            .unwrap_or(false);
        let outcome = execute_order(
            portfolio,
            order,
            close_price,
            config.execution.commission_pct,
            config.execution.slippage_pct,
            date,
            allows_fractional,
        );
        match outcome {
            ExecutionOutcome::Filled(trade) => trades.push(trade),
            ExecutionOutcome::InsufficientCash { symbol, requested } => {
                warn!(
                    symbol = %symbol,
                    requested,
                    date = %date,
                    "InsufficientCash: order skipped"
                );
            }
        }
    }
}
