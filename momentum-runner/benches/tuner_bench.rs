//! Criterion benchmarks for momentum-runner's hyperparameter search.
//!
//! Benchmarks:
//! 1. Grid search over a small parameter grid
//! 2. Seeded random search, varying trial count

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::HashMap;

use momentum_core::domain::Bar;
use momentum_core::fingerprint::RunConfig as CoreRunConfig;
use momentum_core::optimizer::{OptimizationMethod, OptimizerConfig};
use momentum_core::risk::RiskConfig;
use momentum_core::strategy::{MomentumStrategyConfig, RebalanceFrequency, StrengthMethod};

use momentum_runner::config::RunConfig;
use momentum_runner::fitness::FitnessMetric;
use momentum_runner::tuner::{tune, ParamGrid, SearchMethod};

fn make_bars(symbol: &str, n: usize, phase: f64) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2015, 1, 2).unwrap();
    let mut price = 100.0;
    (0..n)
        .map(|i| {
            if i > 0 {
                price *= 1.0 + 0.0004 + 0.01 * ((i as f64 * 0.05) + phase).sin();
            }
            Bar {
                symbol: symbol.to_string(),
                date: base_date + chrono::Duration::days(i as i64),
                open: price,
                high: price * 1.01,
                low: price * 0.99,
                close: price,
                volume: 1_000_000,
                adj_close: price,
            }
        })
        .collect()
}

fn sample_bars() -> HashMap<String, Vec<Bar>> {
    (0..6)
        .map(|i| {
            let symbol = format!("SYM{i}");
            let bars = make_bars(&symbol, 800, i as f64);
            (symbol, bars)
        })
        .collect()
}

fn base_config(universe: Vec<String>) -> RunConfig {
    RunConfig {
        core: CoreRunConfig {
            strategy: MomentumStrategyConfig {
                lookback_period: 63,
                rebalance_frequency: RebalanceFrequency::Monthly,
                position_count: 3,
                strength_method: StrengthMethod::Binary,
                ..Default::default()
            },
            optimizer: OptimizerConfig {
                method: OptimizationMethod::EqualWeight,
                ..Default::default()
            },
            risk: RiskConfig::default(),
            initial_capital: 100_000.0,
            commission_pct: 0.001,
            slippage_pct: 0.0005,
            execution_delay: 1,
        },
        start_date: chrono::NaiveDate::from_ymd_opt(2015, 1, 2).unwrap(),
        end_date: chrono::NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
        universe,
        seed: 42,
    }
}

fn bench_grid_search(c: &mut Criterion) {
    let bars = sample_bars();
    let universe: Vec<String> = bars.keys().cloned().collect();
    let config = base_config(universe);
    let grid = ParamGrid::momentum_default();

    c.bench_function("tuner/grid_search", |b| {
        b.iter(|| {
            tune(
                SearchMethod::Grid,
                black_box(&grid),
                black_box(&config),
                black_box(&bars),
                &HashMap::new(),
                FitnessMetric::Sharpe,
            )
            .unwrap()
        });
    });
}

fn bench_random_search(c: &mut Criterion) {
    let bars = sample_bars();
    let universe: Vec<String> = bars.keys().cloned().collect();
    let config = base_config(universe);
    let grid = ParamGrid::momentum_default();

    let mut group = c.benchmark_group("tuner/random_search");
    for &n_trials in &[10, 30] {
        group.bench_with_input(BenchmarkId::new("n_trials", n_trials), &n_trials, |b, &n| {
            b.iter(|| {
                tune(
                    SearchMethod::Random { n_trials: n },
                    black_box(&grid),
                    black_box(&config),
                    black_box(&bars),
                    &HashMap::new(),
                    FitnessMetric::Sharpe,
                )
                .unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_grid_search, bench_random_search);
criterion_main!(benches);
