//! Record builder: reshapes raw performance series into output records.
//!
//! Every entity yields one primary record (measurement = lower-cased entity
//! type) holding its aggregate counters, plus one record per instanced
//! counter family keyed by (measurement, entity name, instance). Datastore
//! counters never split by instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

use crate::catalog::CounterCatalog;
use crate::inventory::{InventoryContext, TAG_NAME};
use crate::rollup::SENTINEL;
use crate::source::{EntityMetric, MetricSeries};

/// Tag added to instanced records.
pub const TAG_INSTANCE: &str = "instance";

/// Measurement whose counters are always merged into the primary record.
const UNSPLIT_MEASUREMENT: &str = "datastore";

/// One point ready for the time-series database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRecord {
    pub measurement: String,
    pub timestamp: DateTime<Utc>,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, i64>,
}

/// What to do with counters whose name has no recognized rollup suffix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownRollupPolicy {
    /// Write the sentinel value so the field still shows up.
    #[default]
    Sentinel,
    /// Drop the series.
    Skip,
}

/// Diagnostics and policy knobs for one build.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Trace every series as it is reshaped.
    pub verbose: bool,
    pub unknown_rollup: UnknownRollupPolicy,
}

/// Counters describing what a build skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub entities: usize,
    pub series: usize,
    pub unknown_counters: usize,
    pub non_integer_series: usize,
    pub unknown_rollups: usize,
    pub empty_primary: usize,
}

/// Records produced for one target plus what was skipped on the way.
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub records: Vec<OutputRecord>,
    pub stats: BuildStats,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct InstanceKey {
    measurement: String,
    entity_name: String,
    instance: String,
}

#[derive(Debug, Default)]
struct InstanceRecord {
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, i64>,
}

/// Output field key: lower-cased canonical name with `.` replaced by `_`.
pub fn field_key(counter_name: &str) -> String {
    counter_name.to_lowercase().replace('.', "_")
}

/// Measurement root: text before the first `.` of the lower-cased name.
pub fn measurement_root(counter_name: &str) -> String {
    let lower = counter_name.to_lowercase();
    match lower.split_once('.') {
        Some((root, _)) => root.to_string(),
        None => lower,
    }
}

/// Instance label: lower-cased with `.` replaced by `_`, empty for datastore
/// counters.
pub fn instance_label(measurement: &str, raw_instance: &str) -> String {
    if measurement == UNSPLIT_MEASUREMENT {
        return String::new();
    }
    raw_instance.replace('.', "_").to_lowercase()
}

/// Builds output records for one target.
pub struct RecordBuilder<'a> {
    catalog: &'a CounterCatalog,
    inventory: &'a InventoryContext,
    options: BuildOptions,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(
        catalog: &'a CounterCatalog,
        inventory: &'a InventoryContext,
        options: BuildOptions,
    ) -> Self {
        Self {
            catalog,
            inventory,
            options,
        }
    }

    /// Reshapes all entity metrics into records stamped with `timestamp`.
    pub fn build(&self, metrics: &[EntityMetric], timestamp: DateTime<Utc>) -> BuildOutput {
        let mut output = BuildOutput::default();
        for metric in metrics {
            self.build_entity(metric, timestamp, &mut output);
        }
        output
    }

    fn build_entity(
        &self,
        metric: &EntityMetric,
        timestamp: DateTime<Utc>,
        output: &mut BuildOutput,
    ) {
        let stats = &mut output.stats;
        stats.entities += 1;

        let tags = self.inventory.entity_tags(&metric.entity);
        let entity_name = tags.get(TAG_NAME).cloned().unwrap_or_default();

        let mut fields: BTreeMap<String, i64> = BTreeMap::new();
        let mut instanced: BTreeMap<InstanceKey, InstanceRecord> = BTreeMap::new();

        for series in &metric.series {
            stats.series += 1;

            let MetricSeries::Int(series) = series else {
                debug!(
                    "Skipping non-integer series for counter {} on {}",
                    series.counter_id(),
                    metric.entity
                );
                stats.non_integer_series += 1;
                continue;
            };

            let Some(counter) = self.catalog.lookup(series.counter_id) else {
                debug!(
                    "Skipping unknown counter key {} on {}",
                    series.counter_id, metric.entity
                );
                stats.unknown_counters += 1;
                continue;
            };

            let value = match counter.rollup {
                Some(kind) => kind.aggregate(&series.values),
                None => {
                    stats.unknown_rollups += 1;
                    match self.options.unknown_rollup {
                        UnknownRollupPolicy::Sentinel => SENTINEL,
                        UnknownRollupPolicy::Skip => continue,
                    }
                }
            };

            let key = field_key(&counter.name);
            let measurement = measurement_root(&counter.name);
            let instance = instance_label(&measurement, &series.instance);

            if self.options.verbose {
                trace!(
                    entity = %metric.entity,
                    counter = %counter.name,
                    instance = %instance,
                    samples = series.values.len(),
                    value,
                    "reshaped series"
                );
            }

            if instance.is_empty() {
                fields.insert(key, value);
                continue;
            }

            let entry = instanced
                .entry(InstanceKey {
                    measurement,
                    entity_name: entity_name.clone(),
                    instance: instance.clone(),
                })
                .or_insert_with(|| {
                    let mut tags = tags.clone();
                    tags.insert(TAG_INSTANCE.to_string(), instance);
                    InstanceRecord {
                        tags,
                        fields: BTreeMap::new(),
                    }
                });
            entry.fields.insert(key, value);
        }

        if let Some(extra) = self.inventory.extra_fields(&metric.entity) {
            fields.extend(extra.iter().map(|(k, v)| (k.clone(), *v)));
        }

        if fields.is_empty() {
            stats.empty_primary += 1;
        } else {
            output.records.push(OutputRecord {
                measurement: metric.entity.kind.to_lowercase(),
                tags,
                fields,
                timestamp,
            });
        }

        for (key, record) in instanced {
            output.records.push(OutputRecord {
                measurement: key.measurement,
                tags: record.tags,
                fields: record.fields,
                timestamp,
            });
        }
    }
}

/// One `resourcepool` record per pool with its CPU and memory limits.
pub fn resource_pool_records(
    inventory: &InventoryContext,
    timestamp: DateTime<Utc>,
) -> Vec<OutputRecord> {
    inventory
        .resource_pools()
        .iter()
        .map(|pool| OutputRecord {
            measurement: "resourcepool".to_string(),
            tags: BTreeMap::from([
                ("host".to_string(), inventory.target_name().to_string()),
                ("pool_name".to_string(), pool.name.clone()),
            ]),
            fields: BTreeMap::from([
                ("cpu_limit".to_string(), pool.cpu_limit),
                ("memory_limit".to_string(), pool.memory_limit),
            ]),
            timestamp,
        })
        .collect()
}

impl BuildStats {
    /// Logs a warning when the build dropped anything.
    pub fn report(&self, target: &str) {
        let skipped = self.unknown_counters + self.non_integer_series;
        if skipped > 0 || self.unknown_rollups > 0 {
            warn!(
                "{}: skipped {} of {} series ({} unknown counter keys, {} non-integer), \
                 {} without recognized rollup",
                target,
                skipped,
                self.series,
                self.unknown_counters,
                self.non_integer_series,
                self.unknown_rollups
            );
        }
    }
}
