pub mod executor;
pub mod protocol;

pub use executor::{execute_all, Harness, HarnessRun, ScenarioOutcome, SubprocessHarness};
pub use protocol::{HarnessConfig, HarnessOutput};
