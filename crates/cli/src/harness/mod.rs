//! Dispatch run harness: sample documents and run statistics.

mod generator;
mod stats;

pub use generator::DocumentGenerator;
pub use stats::RunStats;
