use std::sync::Arc;
use crate::config::FuzzConfig;
use crate::db::{Database, IterationResultStore, ScannerStore, VulnerabilityStore};
use crate::errors::FuzzError;
use crate::models::{AttackScenario, IterationResult};
use crate::queue::PersistentQueue;

/// The on-disk stores of one run, each in its own database file under
/// `storage_path`.
pub struct RunStores {
    pub scenarios: Arc<PersistentQueue<AttackScenario>>,
    pub results: Arc<PersistentQueue<IterationResult>>,
    pub iteration_results: Arc<IterationResultStore>,
    pub scanners: Arc<ScannerStore>,
    pub vulnerabilities: Arc<VulnerabilityStore>,
}

impl RunStores {
    pub fn open(config: &FuzzConfig) -> Result<Self, FuzzError> {
        let queue = &config.queue;
        Ok(Self {
            scenarios: Arc::new(PersistentQueue::with_sizes(
                Database::open(&config.scenarios_queue_path())?,
                "scenarios",
                queue.batch_size,
                queue.recent_cache_size,
            )?),
            results: Arc::new(PersistentQueue::with_sizes(
                Database::open(&config.results_queue_path())?,
                "iteration_results",
                queue.batch_size,
                queue.recent_cache_size,
            )?),
            iteration_results: Arc::new(IterationResultStore::new(Database::open(&config.results_db_path())?)?),
            scanners: Arc::new(ScannerStore::new(Database::open(&config.monitors_db_path())?)?),
            vulnerabilities: Arc::new(VulnerabilityStore::new(Database::open(&config.registry_db_path())?)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_store_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = FuzzConfig::new(dir.path());
        config.storage_path = dir.path().join("databases");

        RunStores::open(&config).unwrap();
        for path in [
            config.scenarios_queue_path(),
            config.results_queue_path(),
            config.results_db_path(),
            config.monitors_db_path(),
            config.registry_db_path(),
        ] {
            assert!(path.exists(), "{} missing", path.display());
        }
    }
}
