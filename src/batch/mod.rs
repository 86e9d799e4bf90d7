//! Batch runs: one templated call per csv row, bounded concurrency, cooperative cancellation and per-row
//! artifacts and state.

pub mod artifact;
mod control;
mod rows;
mod runner;

pub use control::{RunHandle, RunRegistry};
pub use rows::parse_rows;
pub use runner::{BatchRunner, MAX_CONCURRENCY, MAX_SLEEP_MS, RunSummary};
