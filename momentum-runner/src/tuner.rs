//! Hyperparameter tuning: grid search, seeded random search, and a
//! Bayesian-labeled search that falls back to random sampling in the
//! absence of a surrogate-model library.
//!
//! Trials run concurrently via rayon, but the result vector is always
//! ordered by trial index, not completion order, so two runs of the same
//! search over the same data produce byte-identical `TuningResult`s.

use std::collections::HashMap;

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::fitness::FitnessMetric;
use crate::runner::{self, BacktestResult, RunError};
use momentum_core::domain::{AssetMetadata, Bar, RunId as CoreRunId};
use momentum_core::optimizer::OptimizationMethod;
use momentum_core::rng::RngHierarchy;
use momentum_core::strategy::StrengthMethod;

/// Candidate values for each tunable axis. Cartesian product over all four
/// fields defines the grid-search space; random/Bayesian search samples
/// uniformly from each axis independently.
#[derive(Debug, Clone)]
pub struct ParamGrid {
    pub lookback_periods: Vec<usize>,
    pub position_counts: Vec<usize>,
    pub strength_methods: Vec<StrengthMethod>,
    pub optimizer_methods: Vec<OptimizationMethod>,
}

impl ParamGrid {
    /// A small default grid spanning the most common momentum parameters.
    pub fn momentum_default() -> Self {
        Self {
            lookback_periods: vec![63, 126, 252],
            position_counts: vec![3, 5, 10],
            strength_methods: vec![StrengthMethod::Binary, StrengthMethod::Proportional],
            optimizer_methods: vec![
                OptimizationMethod::EqualWeight,
                OptimizationMethod::InverseVolatility,
                OptimizationMethod::MinimumVariance,
            ],
        }
    }

    pub fn size(&self) -> usize {
        self.lookback_periods.len()
            * self.position_counts.len()
            * self.strength_methods.len()
            * self.optimizer_methods.len()
    }

    /// Materialize every combination in the grid as a `RunConfig`, cloned
    /// from `base_config` with the strategy/optimizer axes overridden.
    pub fn generate_configs(&self, base_config: &RunConfig) -> Vec<RunConfig> {
        let mut configs = Vec::with_capacity(self.size());
        for &lookback in &self.lookback_periods {
            for &position_count in &self.position_counts {
                for strength_method in &self.strength_methods {
                    for &optimizer_method in &self.optimizer_methods {
                        let mut config = base_config.clone();
                        config.core.strategy.lookback_period = lookback;
                        config.core.strategy.position_count = position_count;
                        config.core.strategy.strength_method = strength_method.clone();
                        config.core.optimizer.method = optimizer_method;
                        configs.push(config);
                    }
                }
            }
        }
        configs
    }

    fn sample_one(&self, rng: &mut impl Rng, base_config: &RunConfig) -> RunConfig {
        let mut config = base_config.clone();
        config.core.strategy.lookback_period =
            self.lookback_periods[rng.gen_range(0..self.lookback_periods.len())];
        config.core.strategy.position_count =
            self.position_counts[rng.gen_range(0..self.position_counts.len())];
        config.core.strategy.strength_method =
            self.strength_methods[rng.gen_range(0..self.strength_methods.len())].clone();
        config.core.optimizer.method =
            self.optimizer_methods[rng.gen_range(0..self.optimizer_methods.len())];
        config
    }
}

/// Which search strategy produced a `TuningResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMethod {
    /// Exhaustive, deterministic Cartesian product over the grid.
    Grid,
    /// Seeded uniform random sampling, `n_trials` draws.
    Random { n_trials: usize },
    /// Labeled separately from `Random` for reporting purposes. Without a
    /// surrogate model this degrades to the same uniform sampling as
    /// `Random`, per the fallback allowed when no such library is available.
    Bayesian { n_trials: usize },
}

impl SearchMethod {
    fn n_trials(&self, grid: &ParamGrid) -> usize {
        match self {
            SearchMethod::Grid => grid.size(),
            SearchMethod::Random { n_trials } | SearchMethod::Bayesian { n_trials } => *n_trials,
        }
    }
}

/// Outcome of a single tuning trial.
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    pub index: usize,
    pub config: RunConfig,
    pub result: Option<BacktestResult>,
    pub fitness: f64,
    pub runtime_ms: u64,
}

/// Full output of a tuning run: every trial in index order, plus
/// convenience accessors for the best-performing configuration.
#[derive(Debug, Clone)]
pub struct TuningResult {
    pub method: SearchMethod,
    pub fitness_metric: FitnessMetric,
    pub trials: Vec<TrialOutcome>,
}

impl TuningResult {
    /// Successful trials only, sorted best-first by fitness.
    pub fn sorted_by_fitness(&self) -> Vec<&TrialOutcome> {
        let mut successful: Vec<&TrialOutcome> =
            self.trials.iter().filter(|t| t.result.is_some()).collect();
        successful.sort_by(|a, b| {
            b.fitness
                .partial_cmp(&a.fitness)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        successful
    }

    pub fn top_n(&self, n: usize) -> Vec<&TrialOutcome> {
        self.sorted_by_fitness().into_iter().take(n).collect()
    }

    pub fn best(&self) -> Option<&TrialOutcome> {
        self.sorted_by_fitness().into_iter().next()
    }

    pub fn best_params(&self) -> Option<&RunConfig> {
        self.best().map(|t| &t.config)
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best().map(|t| t.fitness)
    }

    /// The fewest leading trials (in the order they were *indexed*, i.e.
    /// generated, not completed) needed before the running-best fitness
    /// comes within `tolerance_pct` of the final best score. `None` if there
    /// are no successful trials.
    ///
    /// This is the convergence-efficiency measure used to compare search
    /// methods: a method reaching 95% of its eventual best within fewer
    /// trials converges faster.
    pub fn trials_to_within_pct(&self, tolerance_pct: f64) -> Option<usize> {
        let best_score = self.best_score()?;
        let target = best_score - best_score.abs() * tolerance_pct;

        let mut running_best = f64::NEG_INFINITY;
        for (seen, trial) in self.trials.iter().enumerate() {
            if let Some(_result) = &trial.result {
                running_best = running_best.max(trial.fitness);
                if running_best >= target {
                    return Some(seen + 1);
                }
            }
        }
        None
    }
}

fn synthetic_rng_run_id(base_config: &RunConfig) -> CoreRunId {
    CoreRunId::from_bytes(base_config.run_id().as_bytes())
}

fn run_trials(
    configs: Vec<RunConfig>,
    symbol_bars: &HashMap<String, Vec<Bar>>,
    assets: &HashMap<String, AssetMetadata>,
    fitness_metric: FitnessMetric,
) -> Vec<TrialOutcome> {
    configs
        .into_par_iter()
        .enumerate()
        .map(|(index, config)| {
            let started = std::time::Instant::now();
            let outcome = runner::run_backtest(&config, symbol_bars, assets);
            let runtime_ms = started.elapsed().as_millis() as u64;
            match outcome {
                Ok(result) => {
                    let fitness = result.fitness(fitness_metric);
                    TrialOutcome {
                        index,
                        config,
                        result: Some(result),
                        fitness,
                        runtime_ms,
                    }
                }
                Err(err) => {
                    tracing::warn!(trial = index, error = %err, "tuning trial failed");
                    TrialOutcome {
                        index,
                        config,
                        result: None,
                        fitness: f64::NEG_INFINITY,
                        runtime_ms,
                    }
                }
            }
        })
        .collect()
}

/// Run a hyperparameter search over `grid`, starting from `base_config` for
/// every field the search method does not itself vary (data scope, risk,
/// execution costs, capital).
pub fn tune(
    method: SearchMethod,
    grid: &ParamGrid,
    base_config: &RunConfig,
    symbol_bars: &HashMap<String, Vec<Bar>>,
    assets: &HashMap<String, AssetMetadata>,
    fitness_metric: FitnessMetric,
) -> Result<TuningResult, RunError> {
    base_config.validate()?;

    let configs = match method {
        SearchMethod::Grid => grid.generate_configs(base_config),
        SearchMethod::Random { n_trials } | SearchMethod::Bayesian { n_trials } => {
            let hierarchy = RngHierarchy::new(base_config.seed);
            let run_id = synthetic_rng_run_id(base_config);
            (0..n_trials)
                .map(|i| {
                    let mut rng = hierarchy.rng_for(&run_id, "tuner", i as u64);
                    grid.sample_one(&mut rng, base_config)
                })
                .collect()
        }
    };

    let trials = run_trials(configs, symbol_bars, assets, fitness_metric);

    tracing::info!(
        method = ?method,
        trials = trials.len(),
        successful = trials.iter().filter(|t| t.result.is_some()).count(),
        "tuning run completed"
    );

    Ok(TuningResult {
        method,
        fitness_metric,
        trials,
    })
}

/// Run the same grid under each of grid/random/Bayesian search and compare
/// how many trials each needed to approach its own best score, plus the
/// best score each method actually reached.
pub struct ConvergenceComparison {
    pub grid: TuningResult,
    pub random: TuningResult,
    pub bayesian: TuningResult,
}

impl ConvergenceComparison {
    /// `(method_name, best_score, trials_to_within_5pct)` for each method.
    pub fn summary(&self) -> Vec<(&'static str, Option<f64>, Option<usize>)> {
        vec![
            ("grid", self.grid.best_score(), self.grid.trials_to_within_pct(0.05)),
            ("random", self.random.best_score(), self.random.trials_to_within_pct(0.05)),
            (
                "bayesian",
                self.bayesian.best_score(),
                self.bayesian.trials_to_within_pct(0.05),
            ),
        ]
    }
}

pub fn compare_methods(
    grid: &ParamGrid,
    base_config: &RunConfig,
    symbol_bars: &HashMap<String, Vec<Bar>>,
    assets: &HashMap<String, AssetMetadata>,
    fitness_metric: FitnessMetric,
    n_trials: usize,
) -> Result<ConvergenceComparison, RunError> {
    Ok(ConvergenceComparison {
        grid: tune(SearchMethod::Grid, grid, base_config, symbol_bars, assets, fitness_metric)?,
        random: tune(
            SearchMethod::Random { n_trials },
            grid,
            base_config,
            symbol_bars,
            assets,
            fitness_metric,
        )?,
        bayesian: tune(
            SearchMethod::Bayesian { n_trials },
            grid,
            base_config,
            symbol_bars,
            assets,
            fitness_metric,
        )?,
    })
}
