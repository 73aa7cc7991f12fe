pub mod connection;
pub mod iteration_results;
pub mod scanners;
pub mod schema;
pub mod vulnerabilities;

pub use connection::Database;
pub use iteration_results::IterationResultStore;
pub use scanners::ScannerStore;
pub use vulnerabilities::VulnerabilityStore;
