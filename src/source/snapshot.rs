//! Snapshot-backed metric source.
//!
//! A snapshot is a JSON recording of one target: its counter metadata, the
//! inventory walk result and the performance series per entity. Replaying it
//! exercises the full collection path without a live session.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{
    CounterInfo, Discovery, EntityMetric, MetricSeries, MetricSource, PerfQuerySpec, SourceError,
};

/// Root structure of a snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: String,
    pub generated_at: String,
    #[serde(default)]
    pub counters: Vec<CounterInfo>,
    #[serde(default)]
    pub discovery: Discovery,
    #[serde(default)]
    pub samples: Vec<EntityMetric>,
}

impl Snapshot {
    /// Load a snapshot from a JSON file.
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        debug!("Loading snapshot from: {}", path.display());

        let content = fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot: Snapshot =
            serde_json::from_str(&content).map_err(|source| SourceError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        info!(
            "Loaded snapshot version {} from {} ({} counters, {} entities)",
            snapshot.version,
            snapshot.generated_at,
            snapshot.counters.len(),
            snapshot.discovery.entities.len()
        );

        Ok(snapshot)
    }
}

/// Metric source replaying a [`Snapshot`].
pub struct SnapshotSource {
    endpoint: String,
    path: PathBuf,
    snapshot: Snapshot,
}

impl SnapshotSource {
    pub fn new(endpoint: impl Into<String>, snapshot: Snapshot) -> Self {
        Self {
            endpoint: endpoint.into(),
            path: PathBuf::new(),
            snapshot,
        }
    }

    /// Opens the snapshot file recorded for `endpoint`.
    pub fn open(endpoint: impl Into<String>, path: &Path) -> Result<Self, SourceError> {
        let snapshot = Snapshot::load(path)?;
        Ok(Self {
            endpoint: endpoint.into(),
            path: path.to_path_buf(),
            snapshot,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetricSource for SnapshotSource {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn counter_metadata(&self) -> Result<Vec<CounterInfo>, SourceError> {
        Ok(self.snapshot.counters.clone())
    }

    fn discover(&self, entity_types: &[String]) -> Result<Discovery, SourceError> {
        let mut discovery = self.snapshot.discovery.clone();
        discovery
            .entities
            .retain(|e| entity_types.iter().any(|t| *t == e.entity.kind));
        Ok(discovery)
    }

    fn query_perf(&self, queries: &[PerfQuerySpec]) -> Result<Vec<EntityMetric>, SourceError> {
        let mut results = Vec::with_capacity(queries.len());

        for query in queries {
            if query.start > query.end {
                return Err(SourceError::Query(format!(
                    "query window for {} starts after it ends",
                    query.entity
                )));
            }

            let Some(recorded) = self.snapshot.samples.iter().find(|m| m.entity == query.entity)
            else {
                debug!("No recorded samples for {}", query.entity);
                continue;
            };

            let series: Vec<MetricSeries> = recorded
                .series
                .iter()
                .filter(|s| {
                    query
                        .metric_ids
                        .iter()
                        .any(|id| id.matches(s.counter_id(), s.instance()))
                })
                .cloned()
                .collect();

            results.push(EntityMetric {
                entity: query.entity.clone(),
                series,
            });
        }

        Ok(results)
    }
}
