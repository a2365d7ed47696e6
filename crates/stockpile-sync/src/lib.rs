//! The incremental synchronization engine.
//!
//! [`Orchestrator::sync`] walks the six entity kinds of one security in a
//! fixed order. For each kind the [`FreshnessGate`] decides whether a refresh
//! is due, the [`FetchAdapter`](stockpile_core::fetch::FetchAdapter) supplies
//! records, and the [`MergeEngine`] writes them and enforces retention.
//! [`run_batch`] drives many securities concurrently.

pub mod batch;
pub mod config;
pub mod error;
pub mod freshness;
pub mod merge;
pub mod orchestrator;
pub mod pacer;

pub use batch::{BatchReport, SecurityOutcome, run_batch};
pub use config::SyncConfig;
pub use error::{Error, Result};
pub use freshness::FreshnessGate;
pub use merge::MergeEngine;
pub use orchestrator::Orchestrator;
pub use pacer::Pacer;

#[cfg(test)]
mod testing;
