//! Configuration management for vsphere-influx-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats. Keys written by
//! older JSON configs (`VCenters`, `Metrics`, `ObjectType`, ...) are accepted as
//! aliases.

use crate::cli::{Args, ConfigFormat};
use crate::record::UnknownRollupPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// Default configuration constants
pub const DEFAULT_INTERVAL: u64 = 60;
pub const DEFAULT_INFLUX_URL: &str = "http://localhost:8086";
pub const DEFAULT_DATABASE: &str = "vsphere";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not decode configuration file {path}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("Could not encode configuration: {0}")]
    Encode(String),

    #[error("{0}")]
    Invalid(String),
}

/// One vCenter to collect from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(alias = "Hostname")]
    pub hostname: String,
    #[serde(default, alias = "Username")]
    pub username: String,
    #[serde(default, alias = "Password")]
    pub password: String,
    /// Recorded snapshot replayed as this target's source.
    #[serde(default, alias = "Snapshot")]
    pub snapshot: Option<PathBuf>,
}

/// A requested counter by canonical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDef {
    /// Canonical name, e.g. `cpu.usage.average`.
    #[serde(alias = "Metric")]
    pub metric: String,
    /// `"*"` for all instances, `""` for the aggregate instance.
    #[serde(default, alias = "Instances")]
    pub instances: String,
}

/// Counters requested for a set of entity types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRequest {
    #[serde(alias = "ObjectType")]
    pub object_types: Vec<String>,
    #[serde(alias = "Definition")]
    pub definitions: Vec<MetricDef>,
}

/// InfluxDB connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    #[serde(default = "default_influx_url", alias = "Hostname")]
    pub url: String,
    #[serde(default, alias = "Username")]
    pub username: Option<String>,
    #[serde(default, alias = "Password")]
    pub password: Option<String>,
    #[serde(default = "default_database", alias = "Database")]
    pub database: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_influx_url() -> String {
    DEFAULT_INFLUX_URL.to_string()
}
fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}
fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}
fn default_interval() -> u64 {
    DEFAULT_INTERVAL
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: default_influx_url(),
            username: None,
            password: None,
            database: default_database(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Enhanced configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sampling interval in seconds: query window length and run period.
    #[serde(default = "default_interval", alias = "Interval")]
    pub interval: u64,

    /// Suffix stripped from entity and vCenter names.
    #[serde(default, alias = "Domain")]
    pub domain: String,

    #[serde(default)]
    pub unknown_rollup: UnknownRollupPolicy,

    // Tables last so the TOML encoder accepts the layout
    #[serde(default, alias = "VCenters")]
    pub vcenters: Vec<TargetConfig>,

    #[serde(default = "default_metrics", alias = "Metrics")]
    pub metrics: Vec<MetricRequest>,

    #[serde(default, alias = "InfluxDB")]
    pub influxdb: InfluxConfig,
}

fn metric(metric: &str, instances: &str) -> MetricDef {
    MetricDef {
        metric: metric.to_string(),
        instances: instances.to_string(),
    }
}

/// Counters collected when no metrics are configured.
pub fn default_metrics() -> Vec<MetricRequest> {
    vec![
        MetricRequest {
            object_types: vec!["VirtualMachine".into(), "HostSystem".into()],
            definitions: vec![
                metric("cpu.usage.average", ""),
                metric("cpu.usagemhz.average", ""),
                metric("mem.usage.average", ""),
                metric("mem.consumed.average", ""),
                metric("net.bytesRx.average", "*"),
                metric("net.bytesTx.average", "*"),
            ],
        },
        MetricRequest {
            object_types: vec!["VirtualMachine".into()],
            definitions: vec![
                metric("cpu.ready.summation", ""),
                metric("datastore.read.average", "*"),
                metric("datastore.write.average", "*"),
            ],
        },
        MetricRequest {
            object_types: vec!["HostSystem".into()],
            definitions: vec![
                metric("disk.maxTotalLatency.latest", ""),
                metric("disk.numberReadAveraged.average", "*"),
                metric("disk.numberWriteAveraged.average", "*"),
            ],
        },
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vcenters: Vec::new(),
            metrics: default_metrics(),
            interval: DEFAULT_INTERVAL,
            domain: String::new(),
            influxdb: InfluxConfig::default(),
            unknown_rollup: UnknownRollupPolicy::default(),
        }
    }
}

impl Config {
    /// Default config with one example target, used as a file template.
    pub fn template() -> Self {
        Self {
            vcenters: vec![TargetConfig {
                hostname: "vcenter01.example.com".into(),
                username: "monitoring@vsphere.local".into(),
                password: "changeme".into(),
                snapshot: Some(PathBuf::from("/var/lib/vsphere-influx-exporter/vcenter01.json")),
            }],
            domain: ".example.com".into(),
            ..Self::default()
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.vcenters.is_empty() {
        return Err(ConfigError::Invalid("No vcenters configured".into()));
    }

    if cfg.interval == 0 {
        return Err(ConfigError::Invalid("interval must be at least 1 second".into()));
    }

    if cfg.metrics.is_empty() {
        return Err(ConfigError::Invalid("No metrics configured".into()));
    }

    for (idx, request) in cfg.metrics.iter().enumerate() {
        if request.object_types.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "metrics[{}] has no object_types",
                idx
            )));
        }
        for def in &request.definitions {
            if def.metric.split('.').count() < 3 {
                return Err(ConfigError::Invalid(format!(
                    "metrics[{}]: '{}' is not of the form group.name.rollup",
                    idx, def.metric
                )));
            }
        }
    }

    for target in &cfg.vcenters {
        if target.hostname.trim().is_empty() {
            return Err(ConfigError::Invalid("vcenter with empty hostname".into()));
        }
        match &target.snapshot {
            None => {
                return Err(ConfigError::Invalid(format!(
                    "vcenter {} has no snapshot source configured",
                    target.hostname
                )));
            }
            // A missing file fails only this target, at collection time.
            Some(path) if !path.exists() => {
                warn!(
                    "Snapshot file for vcenter {} not found: {}",
                    target.hostname,
                    path.display()
                );
            }
            Some(_) => {}
        }
    }

    if cfg.influxdb.database.trim().is_empty() {
        return Err(ConfigError::Invalid("influxdb.database must not be empty".into()));
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, ConfigError> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(interval) = args.interval {
        config.interval = interval;
    }
    if let Some(domain) = &args.domain {
        config.domain = domain.clone();
    }

    Ok(config)
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        // Try default locations
        let defaults = [
            "/etc/vsphere-influx-exporter.yaml",
            "/etc/vsphere-influx-exporter.yml",
            "/etc/vsphere-influx-exporter.json",
            "./vsphere-influx-exporter.yaml",
            "./vsphere-influx-exporter.yml",
            "./vsphere-influx-exporter.json",
        ];

        defaults
            .iter()
            .find(|p| Path::new(p).exists())
            .map(PathBuf::from)
            .unwrap_or_default()
    };

    if path.as_os_str().is_empty() || !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let decode = |message: String| ConfigError::Decode {
        path: path.clone(),
        message,
    };

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config =
                serde_json::from_str(&content).map_err(|e| decode(e.to_string()))?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content).map_err(|e| decode(e.to_string()))?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config =
                serde_yaml::from_str(&content).map_err(|e| decode(e.to_string()))?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Serializes configuration in the requested format.
pub fn render_config(config: &Config, format: &ConfigFormat) -> Result<String, ConfigError> {
    match format {
        ConfigFormat::Json => {
            serde_json::to_string_pretty(config).map_err(|e| ConfigError::Encode(e.to_string()))
        }
        ConfigFormat::Toml => {
            toml::to_string_pretty(config).map_err(|e| ConfigError::Encode(e.to_string()))
        }
        ConfigFormat::Yaml => {
            serde_yaml::to_string(config).map_err(|e| ConfigError::Encode(e.to_string()))
        }
    }
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), ConfigError> {
    let output = render_config(config, &format)?;
    println!("{output}");
    Ok(())
}
