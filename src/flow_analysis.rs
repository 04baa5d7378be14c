//! Offline analysis of flow-meter CSV exports.
//!
//! Pipeline: `loader` reads the table, `classifier` labels every flow,
//! `statistics` aggregates, `report` writes the derived files and
//! `analyzer` ties the steps together and logs the results.

pub mod analyzer;
pub mod classifier;
pub mod loader;
pub mod report;
pub mod statistics;
pub mod types;

pub use analyzer::FlowAnalyzer;
pub use classifier::{BurstPattern, FlowLabels, FlowType, TimingCategory};
pub use types::{FlowRecord, FlowTable};
