pub mod attack;
pub mod commands;
pub mod monitor;
pub mod plan;
pub mod report;
pub mod stores;

pub use commands::{Cli, Commands};
