//! CLI command implementations for vsphere-influx-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Configuration and counter resolution check
//! - `config`: Configuration file generation
//! - `test`: One-shot collection with record output
//! - `generate-snapshot`: Synthetic snapshot generation

pub mod check;
pub mod config;
pub mod generate;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use generate::command_generate_snapshot;
pub use test::command_test;
