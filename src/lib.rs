//! vSphere InfluxDB Exporter Library
//!
//! Reshapes raw vSphere performance samples into tagged, aggregated records
//! and writes them to InfluxDB.
//!
//! # Pipeline
//!
//! - **Counter Catalog**: resolves configured `group.name.rollup` identifiers
//!   to counter keys and rollup kinds
//! - **Inventory Context**: display names and enrichment tags per entity
//! - **Rollup Aggregator**: collapses a sampling window into one value
//! - **Record Builder**: merges series into one record per entity and
//!   instance
//! - **Sink**: InfluxDB line protocol over HTTP, or stdout
//!
//! # Usage
//!
//! ```rust
//! use vsphere_influx_exporter::rollup::{RollupKind, SENTINEL};
//!
//! assert_eq!(RollupKind::Average.aggregate(&[10, 20, 30]), 20);
//! assert_eq!(RollupKind::Maximum.aggregate(&[-1, -1]), SENTINEL);
//! ```

pub mod catalog;
pub mod cli;
pub mod collector;
pub mod config;
pub mod inventory;
pub mod record;
pub mod rollup;
pub mod sink;
pub mod source;
pub mod stats;

// Re-export main types for convenience
pub use catalog::CounterCatalog;
pub use collector::{collect_target, run_once, RunError, RunSummary};
pub use config::Config;
pub use inventory::InventoryContext;
pub use record::{BuildOptions, OutputRecord, RecordBuilder, UnknownRollupPolicy};
pub use rollup::RollupKind;
pub use sink::{Batch, Sink};
pub use source::{MetricSource, SnapshotSource};
