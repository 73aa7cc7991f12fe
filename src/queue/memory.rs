//! In-process implementations of the queue and registry contracts, used by
//! tests and single-shot runs that do not need durability.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use async_trait::async_trait;
use crate::errors::FuzzError;
use crate::models::{content_id, ContentId, IterationResult, Vulnerability};
use super::contracts::{
    DurableQueue, IterationResultLookup, QueueItem, QueueSink, VulnerabilitySink, VulnerabilitySource,
};

struct MemoryState<T> {
    seen: HashSet<ContentId>,
    pending: VecDeque<T>,
}

/// FIFO queue with the same identity rules as the persistent one: an item
/// whose content id was ever put is ignored.
pub struct MemoryQueue<T> {
    state: Mutex<MemoryState<T>>,
}

impl<T: QueueItem> MemoryQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState { seen: HashSet::new(), pending: VecDeque::new() }),
        }
    }

    fn state(&self) -> Result<std::sync::MutexGuard<'_, MemoryState<T>>, FuzzError> {
        self.state
            .lock()
            .map_err(|_| FuzzError::Internal("Memory queue lock poisoned".into()))
    }
}

impl<T: QueueItem> Default for MemoryQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: QueueItem> QueueSink<T> for MemoryQueue<T> {
    async fn put(&self, items: Vec<T>) -> Result<(), FuzzError> {
        let mut state = self.state()?;
        for item in items {
            let id = content_id(&item)?;
            if state.seen.insert(id) {
                state.pending.push_back(item);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<T: QueueItem> DurableQueue<T> for MemoryQueue<T> {
    async fn get(&self) -> Result<Option<T>, FuzzError> {
        Ok(self.state()?.pending.pop_front())
    }

    async fn size(&self) -> Result<usize, FuzzError> {
        Ok(self.state()?.pending.len())
    }
}

/// Vulnerability registry plus iteration-result lookup held in memory.
#[derive(Default)]
pub struct MemoryVulnerabilities {
    vulnerabilities: Mutex<Vec<(ContentId, Vulnerability)>>,
    results: Mutex<Vec<IterationResult>>,
}

impl MemoryVulnerabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_results(&self, results: Vec<IterationResult>) -> Result<(), FuzzError> {
        self.results
            .lock()
            .map_err(|_| FuzzError::Internal("Result lock poisoned".into()))?
            .extend(results);
        Ok(())
    }
}

#[async_trait]
impl VulnerabilitySink for MemoryVulnerabilities {
    async fn add(&self, vulnerabilities: Vec<Vulnerability>) -> Result<(), FuzzError> {
        let mut stored = self
            .vulnerabilities
            .lock()
            .map_err(|_| FuzzError::Internal("Vulnerability lock poisoned".into()))?;
        for vulnerability in vulnerabilities {
            let id = vulnerability.vulnerability_id()?;
            if !stored.iter().any(|(existing, _)| *existing == id) {
                stored.push((id, vulnerability));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VulnerabilitySource for MemoryVulnerabilities {
    async fn list_all(&self) -> Result<Vec<Vulnerability>, FuzzError> {
        Ok(self
            .vulnerabilities
            .lock()
            .map_err(|_| FuzzError::Internal("Vulnerability lock poisoned".into()))?
            .iter()
            .map(|(_, v)| v.clone())
            .collect())
    }
}

#[async_trait]
impl QueueSink<IterationResult> for MemoryVulnerabilities {
    async fn put(&self, items: Vec<IterationResult>) -> Result<(), FuzzError> {
        self.record_results(items)
    }
}

#[async_trait]
impl IterationResultLookup for MemoryVulnerabilities {
    async fn get(&self, id: ContentId) -> Result<Option<IterationResult>, FuzzError> {
        let results = self
            .results
            .lock()
            .map_err(|_| FuzzError::Internal("Result lock poisoned".into()))?;
        for result in results.iter() {
            if result.iteration_id()? == id {
                return Ok(Some(result.clone()));
            }
        }
        Ok(None)
    }

    async fn get_by_payload_id(&self, payload_id: &str) -> Result<Option<IterationResult>, FuzzError> {
        let results = self
            .results
            .lock()
            .map_err(|_| FuzzError::Internal("Result lock poisoned".into()))?;
        Ok(results.iter().find(|r| r.has_payload_id(payload_id)).cloned())
    }
}
