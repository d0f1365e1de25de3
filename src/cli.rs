//! CLI arguments and subcommands for vsphere-influx-exporter.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "vsphere-influx-exporter",
    about = "Send vSphere performance counters to InfluxDB",
    long_about = "Send vSphere performance counters to InfluxDB.\n\n\
                  Collects performance counters for virtual machines and hosts from one or more \
                  vCenters, aggregates each sampling window by its rollup type and writes \
                  tagged records to InfluxDB.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Trace every reshaped series
    #[arg(long)]
    pub debug: bool,

    /// Collect every target once and exit
    #[arg(long)]
    pub once: bool,

    /// Print line protocol to stdout instead of writing to InfluxDB
    #[arg(long)]
    pub dry_run: bool,

    /// Sampling interval in seconds (override config)
    #[arg(short = 'i', long)]
    pub interval: Option<u64>,

    /// Domain suffix to strip from names (override config)
    #[arg(long)]
    pub domain: Option<String>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and resolve counters on every target
    Check {
        /// List every resolved counter
        #[arg(long)]
        verbose: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Collect every target once and print the records
    Test {
        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,
    },

    /// Generate a synthetic target snapshot JSON file
    GenerateSnapshot {
        /// Output file path
        #[arg(short = 'o', long, default_value = "snapshot.json")]
        output: PathBuf,

        /// Number of hosts to generate
        #[arg(long, default_value_t = 2)]
        hosts: usize,

        /// Number of virtual machines per host
        #[arg(long, default_value_t = 4)]
        vms_per_host: usize,

        /// Samples per series
        #[arg(long, default_value_t = 3)]
        samples: usize,
    },
}
