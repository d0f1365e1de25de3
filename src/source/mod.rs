//! Source-side data model and the collaborator seam to the management API.
//!
//! This module provides:
//! - the raw shapes the management API hands back (counter metadata,
//!   discovery results, performance series)
//! - `MetricSource`: the trait a per-target client implements
//! - `snapshot`: a client that replays a recorded target from a JSON file

pub mod snapshot;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub use snapshot::{Snapshot, SnapshotSource};

/// Reference to a managed object, unique within one target's inventory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl EntityRef {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// One entry of the target's performance counter metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterInfo {
    pub key: i32,
    pub group: String,
    pub name: String,
    pub rollup: String,
}

impl CounterInfo {
    /// Composite identifier in the form `group.name.rollup`.
    pub fn identifier(&self) -> String {
        format!("{}.{}.{}", self.group, self.name, self.rollup)
    }
}

/// A managed entity returned by the inventory walk, with its display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedEntity {
    pub entity: EntityRef,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmSummary {
    pub entity: EntityRef,
    /// Host the VM currently runs on.
    #[serde(default)]
    pub host: Option<EntityRef>,
    /// Configuration file path, e.g. `[datastore1] web01/web01.vmx`.
    #[serde(default)]
    pub vm_path_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSummary {
    pub entity: EntityRef,
    pub name: String,
    #[serde(default)]
    pub cpu_threads: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub entity: EntityRef,
    pub name: String,
    /// VMs listed in the cluster's HA configuration.
    #[serde(default)]
    pub vms: Vec<EntityRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcePoolInfo {
    pub entity: EntityRef,
    pub name: String,
    #[serde(default)]
    pub vms: Vec<EntityRef>,
    #[serde(default = "unlimited")]
    pub cpu_limit: i64,
    #[serde(default = "unlimited")]
    pub memory_limit: i64,
}

fn unlimited() -> i64 {
    -1
}

/// Everything the inventory walk found for one target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Discovery {
    #[serde(default)]
    pub entities: Vec<ManagedEntity>,
    #[serde(default)]
    pub virtual_machines: Vec<VmSummary>,
    #[serde(default)]
    pub hosts: Vec<HostSummary>,
    #[serde(default)]
    pub clusters: Vec<ClusterInfo>,
    #[serde(default)]
    pub resource_pools: Vec<ResourcePoolInfo>,
}

/// Counter/instance pair requested for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerfMetricId {
    pub counter_id: i32,
    /// `"*"` for all instances, `""` for the aggregate instance.
    pub instance: String,
}

impl PerfMetricId {
    /// Whether a series reported for `instance` is covered by this request.
    pub fn matches(&self, counter_id: i32, instance: &str) -> bool {
        self.counter_id == counter_id && (self.instance == "*" || self.instance == instance)
    }
}

/// Performance query for one entity over one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerfQuerySpec {
    pub entity: EntityRef,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub interval_id: i32,
    pub metric_ids: Vec<PerfMetricId>,
}

/// Integer samples for one counter instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntSeries {
    pub counter_id: i32,
    #[serde(default)]
    pub instance: String,
    pub values: Vec<i64>,
}

/// Comma-separated samples, as returned by the CSV query format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvSeries {
    pub counter_id: i32,
    #[serde(default)]
    pub instance: String,
    pub value: String,
}

/// Series kinds the management API can return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MetricSeries {
    Int(IntSeries),
    Csv(CsvSeries),
}

impl MetricSeries {
    pub fn counter_id(&self) -> i32 {
        match self {
            Self::Int(s) => s.counter_id,
            Self::Csv(s) => s.counter_id,
        }
    }

    pub fn instance(&self) -> &str {
        match self {
            Self::Int(s) => &s.instance,
            Self::Csv(s) => &s.instance,
        }
    }
}

/// All series returned for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetric {
    pub entity: EntityRef,
    #[serde(default)]
    pub series: Vec<MetricSeries>,
}

/// Errors raised by a metric source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to read snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse snapshot {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Query failed: {0}")]
    Query(String),
}

/// Per-target client for counter metadata, inventory and performance data.
///
/// Implementations hold the session for exactly one target; counter keys and
/// entity references never travel between two sources.
pub trait MetricSource {
    /// Display name of the endpoint (usually its hostname).
    fn endpoint(&self) -> &str;

    /// Full performance counter metadata of the target.
    fn counter_metadata(&self) -> Result<Vec<CounterInfo>, SourceError>;

    /// Walks the inventory for the given entity types. Clusters, resource
    /// pools and host summaries are always included for tag enrichment.
    fn discover(&self, entity_types: &[String]) -> Result<Discovery, SourceError>;

    /// Runs the performance queries and returns the series per entity.
    fn query_perf(&self, queries: &[PerfQuerySpec]) -> Result<Vec<EntityMetric>, SourceError>;
}
