pub mod loader;

pub use loader::{load_strategies, ScannerDefinition, StrategyDefinition};
