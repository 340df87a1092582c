//! Reporting and export — JSON, CSV, and Markdown artifact generation.
//!
//! Three export formats:
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: trade tape and equity curve for external analysis tools
//! - **Markdown**: a human-readable single-run report
//!
//! Persisted JSON artifacts carry a `schema_version` field; loading rejects
//! anything newer than the version this crate understands.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::runner::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export the trade tape as CSV.
pub fn export_trades_csv(result: &BacktestResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "symbol",
        "side",
        "date",
        "quantity",
        "price",
        "commission",
        "slippage_cost",
        "pnl",
    ])?;

    for t in &result.trades {
        wtr.write_record([
            t.symbol.as_str(),
            &format!("{:?}", t.side),
            &t.date.to_string(),
            &format!("{:.6}", t.quantity),
            &format!("{:.6}", t.price),
            &format!("{:.2}", t.commission),
            &format!("{:.2}", t.slippage_cost),
            &t.pnl.map(|p| format!("{p:.2}")).unwrap_or_default(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export the equity curve as CSV.
pub fn export_equity_csv(result: &BacktestResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "equity"])?;
    for point in &result.equity_curve {
        wtr.write_record([&point.date.to_string(), &format!("{:.2}", point.equity)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Every path written by `ArtifactManager::save_run`.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub run_dir: PathBuf,
    pub manifest: PathBuf,
    pub equity_csv: PathBuf,
    pub trades_csv: PathBuf,
    pub report_markdown: Option<PathBuf>,
}

/// Writes the full artifact set for a backtest run under a run-id-named
/// subdirectory of `output_dir`.
#[derive(Debug, Clone)]
pub struct ArtifactManager {
    output_dir: PathBuf,
}

impl ArtifactManager {
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir)
            .context("failed to create artifact output directory")?;
        Ok(Self { output_dir })
    }

    /// Save `manifest.json`, `equity.csv`, and `trades.csv`. `manifest.json`
    /// is the full `BacktestResult`, so a manifest alone is sufficient to
    /// reconstruct everything via `import_json`.
    pub fn save_run(&self, result: &BacktestResult) -> Result<ArtifactPaths> {
        let run_dir = self.output_dir.join(&result.run_id);
        std::fs::create_dir_all(&run_dir)
            .context("failed to create run artifact directory")?;

        let manifest_path = run_dir.join("manifest.json");
        std::fs::write(&manifest_path, export_json(result)?)
            .with_context(|| format!("failed to write {}", manifest_path.display()))?;

        let equity_csv = run_dir.join("equity.csv");
        std::fs::write(&equity_csv, export_equity_csv(result)?)
            .with_context(|| format!("failed to write {}", equity_csv.display()))?;

        let trades_csv = run_dir.join("trades.csv");
        std::fs::write(&trades_csv, export_trades_csv(result)?)
            .with_context(|| format!("failed to write {}", trades_csv.display()))?;

        Ok(ArtifactPaths {
            run_dir,
            manifest: manifest_path,
            equity_csv,
            trades_csv,
            report_markdown: None,
        })
    }
}

/// Save the artifact bundle and, optionally, a Markdown report alongside it.
pub fn export_run_with_report(
    output_dir: impl AsRef<Path>,
    result: &BacktestResult,
    include_report: bool,
) -> Result<ArtifactPaths> {
    let manager = ArtifactManager::new(output_dir)?;
    let mut paths = manager.save_run(result)?;

    if include_report {
        let report_path = paths.run_dir.join("report.md");
        std::fs::write(&report_path, generate_report(result))
            .with_context(|| format!("failed to write {}", report_path.display()))?;
        paths.report_markdown = Some(report_path);
    }

    Ok(paths)
}

// ─── Markdown reports ───────────────────────────────────────────────

/// Generate a Markdown report for a single backtest run.
pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(2048);

    md.push_str("# Backtest Report\n\n");

    md.push_str("## Run\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Run ID | `{}` |\n", result.run_id));
    md.push_str(&format!(
        "| Period | {} to {} |\n",
        result.config.start_date, result.config.end_date
    ));
    md.push_str(&format!("| Universe | {} |\n", result.config.universe.join(", ")));
    md.push_str(&format!(
        "| Initial Capital | ${:.0} |\n",
        result.config.core.initial_capital
    ));
    md.push_str(&format!("| Bars | {} |\n", result.bar_count));
    md.push_str(&format!("| Rebalances | {} |\n", result.rebalance_count));
    md.push_str(&format!("| Dataset Hash | {} |\n", result.dataset_hash));
    md.push('\n');

    md.push_str("## Strategy\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!(
        "| Lookback | {} |\n",
        result.config.core.strategy.lookback_period
    ));
    md.push_str(&format!(
        "| Positions | {} |\n",
        result.config.core.strategy.position_count
    ));
    md.push_str(&format!(
        "| Rebalance | {:?} |\n",
        result.config.core.strategy.rebalance_frequency
    ));
    md.push_str(&format!(
        "| Optimizer | {:?} |\n",
        result.config.core.optimizer.method
    ));
    md.push('\n');

    let m = &result.metrics;
    md.push_str("## Performance\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Total Return | {:.2}% |\n", m.total_return * 100.0));
    md.push_str(&format!("| CAGR | {:.2}% |\n", m.cagr * 100.0));
    md.push_str(&format!("| Sharpe | {:.3} |\n", m.sharpe));
    md.push_str(&format!("| Sortino | {:.3} |\n", m.sortino));
    md.push_str(&format!("| Calmar | {:.3} |\n", m.calmar));
    md.push_str(&format!("| Max Drawdown | {:.2}% |\n", m.max_drawdown * 100.0));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", m.win_rate * 100.0));
    md.push_str(&format!("| Profit Factor | {:.2} |\n", m.profit_factor));
    md.push_str(&format!("| Trades | {} |\n", m.trade_count));
    md.push('\n');

    if !result.trades.is_empty() {
        md.push_str("## Trade Tape\n\n");

        let mut sorted: Vec<_> = result.trades.iter().collect();
        sorted.sort_by(|a, b| {
            b.pnl
                .unwrap_or(0.0)
                .partial_cmp(&a.pnl.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        md.push_str("### Top Winners\n");
        md.push_str("| Symbol | Side | Date | Qty | Price | PnL |\n");
        md.push_str("|--------|------|------|-----|-------|-----|\n");
        for t in sorted.iter().take(5).filter(|t| t.pnl.unwrap_or(0.0) > 0.0) {
            md.push_str(&format!(
                "| {} | {:?} | {} | {:.2} | {:.2} | {:+.2} |\n",
                t.symbol,
                t.side,
                t.date,
                t.quantity,
                t.price,
                t.pnl.unwrap_or(0.0)
            ));
        }

        md.push_str("\n### Top Losers\n");
        md.push_str("| Symbol | Side | Date | Qty | Price | PnL |\n");
        md.push_str("|--------|------|------|-----|-------|-----|\n");
        for t in sorted.iter().rev().take(5).filter(|t| t.pnl.unwrap_or(0.0) <= 0.0) {
            md.push_str(&format!(
                "| {} | {:?} | {} | {:.2} | {:.2} | {:+.2} |\n",
                t.symbol,
                t.side,
                t.date,
                t.quantity,
                t.price,
                t.pnl.unwrap_or(0.0)
            ));
        }
        md.push('\n');
    }

    if !result.skipped_signals.is_empty() {
        md.push_str("## Skipped Signals\n\n");
        md.push_str(&format!("- Total skipped: {}\n", result.skipped_signals.len()));
        let mut by_reason: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        for s in &result.skipped_signals {
            *by_reason.entry(s.reason.clone()).or_insert(0) += 1;
        }
        md.push_str("\n| Reason | Count |\n");
        md.push_str("|--------|-------|\n");
        for (reason, count) in &by_reason {
            md.push_str(&format!("| {reason} | {count} |\n"));
        }
        md.push('\n');
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use chrono::NaiveDate;
    use momentum_core::domain::DatasetHash;
    use momentum_core::fingerprint::RunConfig as CoreRunConfig;
    use momentum_core::optimizer::OptimizerConfig;
    use momentum_core::risk::RiskConfig;
    use momentum_core::strategy::MomentumStrategyConfig;

    fn sample_result() -> BacktestResult {
        let config = RunConfig {
            core: CoreRunConfig {
                strategy: MomentumStrategyConfig::default(),
                optimizer: OptimizerConfig::default(),
                risk: RiskConfig::default(),
                initial_capital: 100_000.0,
                commission_pct: 0.0,
                slippage_pct: 0.0,
                execution_delay: 0,
            },
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            universe: vec!["SPY".into()],
            seed: 1,
        };
        BacktestResult {
            schema_version: SCHEMA_VERSION,
            run_id: config.run_id(),
            config,
            dataset_hash: DatasetHash::from_bytes(b"test"),
            metrics: momentum_core::metrics::compute(&[], &[], 0.0),
            equity_curve: vec![],
            trades: vec![],
            skipped_signals: vec![],
            rebalance_count: 0,
            bar_count: 0,
        }
    }

    #[test]
    fn json_roundtrip() {
        let result = sample_result();
        let json = export_json(&result).unwrap();
        let back = import_json(&json).unwrap();
        assert_eq!(back.run_id, result.run_id);
    }

    #[test]
    fn import_rejects_future_schema_version() {
        let mut result = sample_result();
        result.schema_version = SCHEMA_VERSION + 1;
        let json = export_json(&result).unwrap();
        assert!(import_json(&json).is_err());
    }

    #[test]
    fn trades_csv_has_header() {
        let result = sample_result();
        let csv = export_trades_csv(&result).unwrap();
        assert!(csv.starts_with("symbol,side,date"));
    }

    #[test]
    fn equity_csv_has_header() {
        let result = sample_result();
        let csv = export_equity_csv(&result).unwrap();
        assert!(csv.starts_with("date,equity"));
    }

    #[test]
    fn markdown_report_contains_run_id() {
        let result = sample_result();
        let report = generate_report(&result);
        assert!(report.contains(&result.run_id));
        assert!(report.contains("## Performance"));
    }

    #[test]
    fn save_run_writes_all_artifacts() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = ArtifactManager::new(temp_dir.path()).unwrap();
        let result = sample_result();

        let paths = manager.save_run(&result).unwrap();

        assert!(paths.manifest.exists());
        assert!(paths.equity_csv.exists());
        assert!(paths.trades_csv.exists());
        assert!(paths.report_markdown.is_none());
    }

    #[test]
    fn export_run_with_report_writes_markdown() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = sample_result();

        let paths = export_run_with_report(temp_dir.path(), &result, true).unwrap();

        assert!(paths.report_markdown.is_some());
        assert!(paths.report_markdown.unwrap().exists());
    }
}
