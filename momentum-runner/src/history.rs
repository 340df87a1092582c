//! Trial history — JSONL append-only persistence with write filtering.
//!
//! Persists run fingerprints and metrics as one JSON object per line. A
//! write filter prevents junk configurations from bloating the history file
//! during long tuner sessions (thousands of trials).
//!
//! The history enables meta-analysis: "which strength method or optimizer
//! method contributes most to performance across all tested configurations?"

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use momentum_core::fingerprint::RunFingerprint;
use momentum_core::metrics::PerformanceMetrics;
use momentum_core::optimizer::OptimizationMethod;
use momentum_core::strategy::StrengthMethod;

/// A single history entry: fingerprint + metrics snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub fingerprint: RunFingerprint,
    pub metrics: PerformanceMetrics,
    pub trade_count: usize,
    pub fitness_score: f64,
}

/// Criteria for whether a run should be persisted to the history file.
///
/// Default: at least 5 trades AND (positive CAGR OR Sharpe > -1.0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteFilter {
    pub min_trades: usize,
    pub min_cagr: Option<f64>,
    pub min_sharpe: Option<f64>,
}

impl Default for WriteFilter {
    fn default() -> Self {
        Self {
            min_trades: 5,
            min_cagr: Some(0.0),
            min_sharpe: Some(-1.0),
        }
    }
}

impl WriteFilter {
    /// Check whether a run meets the write criteria.
    ///
    /// Logic: `trade_count >= min_trades AND (cagr >= min_cagr OR sharpe >= min_sharpe)`.
    pub fn should_write(&self, metrics: &PerformanceMetrics, trade_count: usize) -> bool {
        if trade_count < self.min_trades {
            return false;
        }
        let cagr_ok = self.min_cagr.is_none_or(|min| metrics.cagr >= min);
        let sharpe_ok = self.min_sharpe.is_none_or(|min| metrics.sharpe >= min);
        cagr_ok || sharpe_ok
    }
}

/// JSONL history file manager.
///
/// Appends filtered entries to a JSONL file. Each line is an independent JSON
/// object, making the format resilient to partial writes and easy to stream.
pub struct YoloHistory {
    path: PathBuf,
    filter: WriteFilter,
}

impl YoloHistory {
    pub fn new(path: PathBuf, filter: WriteFilter) -> Self {
        Self { path, filter }
    }

    /// Append an entry to the history file if it passes the write filter.
    ///
    /// Returns `Ok(true)` if the entry was written, `Ok(false)` if filtered out.
    pub fn append(&self, entry: &HistoryEntry) -> io::Result<bool> {
        if !self.filter.should_write(&entry.metrics, entry.trade_count) {
            return Ok(false);
        }

        let json = serde_json::to_string(entry)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        writeln!(file, "{json}")?;
        file.flush()?;

        Ok(true)
    }

    /// Get the current file size in bytes.
    pub fn file_size_bytes(&self) -> io::Result<u64> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Read all entries from the history file.
    ///
    /// Skips malformed lines (logged but not fatal).
    pub fn read_all(&self) -> io::Result<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.path)?;
        let reader = io::BufReader::new(file);
        let mut entries = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(_) => continue,
            }
        }

        Ok(entries)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Statistical summary for a group of trials sharing a structural choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentSummary {
    pub count: usize,
    pub mean_sharpe: f64,
    pub median_sharpe: f64,
    pub p25_sharpe: f64,
    pub p75_sharpe: f64,
    pub mean_win_rate: f64,
}

fn strength_method_name(method: &StrengthMethod) -> String {
    match method {
        StrengthMethod::Binary => "binary".into(),
        StrengthMethod::Linear { .. } => "linear".into(),
        StrengthMethod::Proportional => "proportional".into(),
        StrengthMethod::MomentumRatio => "momentum_ratio".into(),
    }
}

/// Group trials by strength method and compute summary statistics.
pub fn summary_by_strength_method(entries: &[HistoryEntry]) -> HashMap<String, ComponentSummary> {
    group_and_summarize(entries, |e| {
        strength_method_name(&e.fingerprint.run_config.strategy.strength_method)
    })
}

/// Group trials by optimizer method and compute summary statistics.
pub fn summary_by_optimizer_method(entries: &[HistoryEntry]) -> HashMap<String, ComponentSummary> {
    group_and_summarize(entries, |e| {
        format!("{:?}", e.fingerprint.run_config.optimizer.method)
    })
}

/// Group trials by whether dual momentum is enabled.
pub fn summary_by_dual_momentum(entries: &[HistoryEntry]) -> HashMap<String, ComponentSummary> {
    group_and_summarize(entries, |e| {
        e.fingerprint.run_config.strategy.dual_momentum.to_string()
    })
}

fn group_and_summarize<F>(entries: &[HistoryEntry], key_fn: F) -> HashMap<String, ComponentSummary>
where
    F: Fn(&HistoryEntry) -> String,
{
    let mut groups: HashMap<String, Vec<&HistoryEntry>> = HashMap::new();

    for entry in entries {
        let key = key_fn(entry);
        groups.entry(key).or_default().push(entry);
    }

    groups
        .into_iter()
        .map(|(key, group)| {
            let mut sharpes: Vec<f64> = group.iter().map(|e| e.metrics.sharpe).collect();
            sharpes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

            let n = sharpes.len();
            let mean_sharpe = sharpes.iter().sum::<f64>() / n as f64;
            let median_sharpe = if n % 2 == 0 {
                (sharpes[n / 2 - 1] + sharpes[n / 2]) / 2.0
            } else {
                sharpes[n / 2]
            };
            let p25_sharpe = sharpes[n / 4];
            let p75_sharpe = sharpes[3 * n / 4];
            let mean_win_rate = group.iter().map(|e| e.metrics.win_rate).sum::<f64>() / n as f64;

            (
                key,
                ComponentSummary {
                    count: n,
                    mean_sharpe,
                    median_sharpe,
                    p25_sharpe,
                    p75_sharpe,
                    mean_win_rate,
                },
            )
        })
        .collect()
}
