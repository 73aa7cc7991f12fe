pub mod contracts;
pub mod memory;
pub mod persistent;

pub use contracts::{
    DurableQueue, IterationResultLookup, QueueItem, QueueSink, ScannerLookup, VulnerabilitySink,
    VulnerabilitySource,
};
pub use memory::{MemoryQueue, MemoryVulnerabilities};
pub use persistent::PersistentQueue;
