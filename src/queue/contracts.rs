use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use crate::errors::FuzzError;
use crate::models::{ContentId, IterationResult, Vulnerability};
use crate::scanners::Scanner;

/// Anything that can travel through a queue: serializable to the canonical
/// form its identity is computed from.
pub trait QueueItem: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> QueueItem for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

#[async_trait]
pub trait QueueSink<T: QueueItem>: Send + Sync {
    /// Best-effort, idempotent by content identity.
    async fn put(&self, items: Vec<T>) -> Result<(), FuzzError>;
}

#[async_trait]
pub trait DurableQueue<T: QueueItem>: QueueSink<T> {
    /// Next undelivered item, or `None` when the queue is drained. Never blocks
    /// waiting for new items.
    async fn get(&self) -> Result<Option<T>, FuzzError>;

    /// Undelivered items, including the ones prefetched in memory.
    async fn size(&self) -> Result<usize, FuzzError>;
}

#[async_trait]
pub trait VulnerabilitySink: Send + Sync {
    async fn add(&self, vulnerabilities: Vec<Vulnerability>) -> Result<(), FuzzError>;
}

#[async_trait]
pub trait VulnerabilitySource: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Vulnerability>, FuzzError>;
}

#[async_trait]
pub trait IterationResultLookup: Send + Sync {
    async fn get(&self, id: ContentId) -> Result<Option<IterationResult>, FuzzError>;

    async fn get_by_payload_id(&self, payload_id: &str) -> Result<Option<IterationResult>, FuzzError>;
}

#[async_trait]
pub trait ScannerLookup: Send + Sync {
    async fn get(&self, id: ContentId) -> Result<Option<Scanner>, FuzzError>;
}
