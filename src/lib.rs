pub mod cli;
pub mod config;
pub mod db;
pub mod errors;
pub mod harness;
pub mod matching;
pub mod models;
pub mod pipeline;
pub mod queue;
pub mod routes;
pub mod scanners;
pub mod strategies;
pub mod utils;
