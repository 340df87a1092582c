//! Trial result caching, keyed by content hash of the run configuration
//! (§10.5: repeated tuner trials with identical configs are served from disk
//! instead of recomputed).

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::RunId;
use crate::runner::BacktestResult;

/// On-disk cache for backtest results, one JSON file per `RunId`.
#[derive(Clone)]
pub struct ResultCache {
    cache_dir: PathBuf,
}

impl ResultCache {
    /// Creates a new cache with the specified directory.
    ///
    /// The directory is created if it doesn't exist.
    pub fn new(cache_dir: impl AsRef<Path>) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&cache_dir).context("failed to create cache directory")?;
        Ok(Self { cache_dir })
    }

    /// Checks if a result is cached for the given RunId.
    pub fn contains(&self, run_id: &RunId) -> bool {
        self.result_path(run_id).exists()
    }

    /// Retrieves a cached result by RunId, `None` if not cached.
    pub fn get(&self, run_id: &RunId) -> Result<Option<BacktestResult>> {
        let path = self.result_path(run_id);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path).context("failed to read cached result")?;
        let result: BacktestResult =
            serde_json::from_str(&json).context("failed to deserialize cached result")?;
        Ok(Some(result))
    }

    /// Stores a result in the cache, keyed by its own `run_id`.
    pub fn put(&self, result: &BacktestResult) -> Result<()> {
        let path = self.result_path(&result.run_id);
        let json = serde_json::to_string_pretty(result).context("failed to serialize result")?;
        std::fs::write(&path, json).context("failed to write cached result")?;
        Ok(())
    }

    /// Removes a result from the cache.
    pub fn remove(&self, run_id: &RunId) -> Result<()> {
        let path = self.result_path(run_id);
        if path.exists() {
            std::fs::remove_file(path).context("failed to remove cached result")?;
        }
        Ok(())
    }

    /// Clears all cached results.
    pub fn clear(&self) -> Result<()> {
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    /// Returns the number of cached results.
    pub fn len(&self) -> Result<usize> {
        let count = std::fs::read_dir(&self.cache_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry.path().is_file()
                    && entry.path().extension().and_then(|s| s.to_str()) == Some("json")
            })
            .count();
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn result_path(&self, run_id: &RunId) -> PathBuf {
        self.cache_dir.join(format!("{run_id}.json"))
    }
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

    fn create_test_result(run_id: &str) -> BacktestResult {
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
            universe: vec!["A".into()],
            seed: 1,
        };
        BacktestResult {
            schema_version: crate::runner::SCHEMA_VERSION,
            run_id: run_id.to_string(),
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
    fn put_then_get_roundtrips() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(temp_dir.path()).unwrap();
        let run_id = "test_run_123".to_string();
        let result = create_test_result(&run_id);

        assert!(!cache.contains(&run_id));
        assert!(cache.get(&run_id).unwrap().is_none());

        cache.put(&result).unwrap();

        assert!(cache.contains(&run_id));
        let retrieved = cache.get(&run_id).unwrap().unwrap();
        assert_eq!(retrieved.run_id, run_id);
    }

    #[test]
    fn remove_deletes_entry() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(temp_dir.path()).unwrap();
        let run_id = "test_run_456".to_string();
        let result = create_test_result(&run_id);

        cache.put(&result).unwrap();
        assert!(cache.contains(&run_id));
        cache.remove(&run_id).unwrap();
        assert!(!cache.contains(&run_id));
    }

    #[test]
    fn clear_empties_cache() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(temp_dir.path()).unwrap();

        for i in 0..5 {
            let run_id = format!("test_run_{i}");
            cache.put(&create_test_result(&run_id)).unwrap();
        }

        assert_eq!(cache.len().unwrap(), 5);
        cache.clear().unwrap();
        assert_eq!(cache.len().unwrap(), 0);
    }
}
