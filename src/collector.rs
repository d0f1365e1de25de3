//! Collection of one run across all configured targets.
//!
//! Targets are processed one after another. For each target the counter
//! catalog and inventory context are built, the performance window is
//! queried, records are built and the batch is handed to the sink. A failing
//! target is logged and skipped; the run only fails when every target fails.

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::catalog::CounterCatalog;
use crate::config::{Config, TargetConfig};
use crate::inventory::InventoryContext;
use crate::record::{resource_pool_records, BuildOptions, BuildStats, OutputRecord, RecordBuilder};
use crate::sink::{Batch, Sink};
use crate::source::{
    Discovery, EntityMetric, MetricSource, PerfMetricId, PerfQuerySpec, SnapshotSource,
};

/// Historical interval id of the real-time (20 second) performance samples.
pub const REALTIME_INTERVAL_ID: i32 = 20;

/// Longest query window; the real-time samples do not reach further back.
const MAX_WINDOW_SECS: u64 = 86_400;

/// Records built for one target.
#[derive(Debug, Clone)]
pub struct TargetCollection {
    pub target: String,
    pub records: Vec<OutputRecord>,
    pub stats: BuildStats,
    pub queried_entities: usize,
}

/// Outcome of one target within a run.
#[derive(Debug, Clone)]
pub struct TargetReport {
    pub target: String,
    pub records: usize,
    pub stats: BuildStats,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone)]
pub struct TargetFailure {
    pub target: String,
    pub error: String,
}

/// Outcome of one run over every target.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub succeeded: Vec<TargetReport>,
    pub failed: Vec<TargetFailure>,
    pub duration_seconds: f64,
}

impl RunSummary {
    pub fn records(&self) -> usize {
        self.succeeded.iter().map(|r| r.records).sum()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("All {0} targets failed")]
    AllTargetsFailed(usize),
}

/// Query window ending one second before `now` and spanning `interval_secs`.
pub fn query_window(now: DateTime<Utc>, interval_secs: u64) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = now - Duration::seconds(1);
    let start = end - Duration::seconds(interval_secs.min(MAX_WINDOW_SECS) as i64);
    (start, end)
}

/// One query per discovered entity whose type has resolved counters.
pub fn build_queries(
    catalog: &CounterCatalog,
    discovery: &Discovery,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<PerfQuerySpec> {
    discovery
        .entities
        .iter()
        .filter_map(|entity| {
            let group = catalog.group(&entity.entity.kind)?;
            let metric_ids = group
                .counters
                .iter()
                .map(|c| PerfMetricId {
                    counter_id: c.key,
                    instance: c.instances.clone(),
                })
                .collect();
            Some(PerfQuerySpec {
                entity: entity.entity.clone(),
                start,
                end,
                interval_id: REALTIME_INTERVAL_ID,
                metric_ids,
            })
        })
        .collect()
}

/// Builds every record for one target. No sink I/O happens here.
#[instrument(skip_all, fields(target = %source.endpoint()))]
pub fn collect_target<S: MetricSource>(
    source: &S,
    config: &Config,
    options: BuildOptions,
    now: DateTime<Utc>,
) -> anyhow::Result<TargetCollection> {
    let counters = source
        .counter_metadata()
        .context("retrieving performance counter metadata")?;
    let catalog = CounterCatalog::build(&counters, &config.metrics);
    debug!(
        "Resolved {} counters for {} entity types ({} unresolved)",
        catalog.counter_count(),
        catalog.groups().len(),
        catalog.unresolved().len()
    );

    let discovery = source
        .discover(&catalog.entity_types())
        .context("discovering inventory")?;
    let inventory = InventoryContext::from_discovery(source.endpoint(), &discovery, &config.domain);
    debug!(
        "Inventory holds {} named entities and {} resource pools",
        inventory.entity_count(),
        inventory.resource_pools().len()
    );

    let (start, end) = query_window(now, config.interval);
    let queries = build_queries(&catalog, &discovery, start, end);
    let metrics: Vec<EntityMetric> = if queries.is_empty() {
        warn!("No entities to query");
        Vec::new()
    } else {
        source
            .query_perf(&queries)
            .context("querying performance data")?
    };

    let mut output = RecordBuilder::new(&catalog, &inventory, options).build(&metrics, now);
    output.stats.report(source.endpoint());
    output
        .records
        .extend(resource_pool_records(&inventory, now));

    Ok(TargetCollection {
        target: inventory.target_name().to_string(),
        records: output.records,
        stats: output.stats,
        queried_entities: queries.len(),
    })
}

/// Opens the source configured for a target.
pub fn open_source(target: &TargetConfig) -> anyhow::Result<SnapshotSource> {
    let path = target
        .snapshot
        .as_deref()
        .with_context(|| format!("vcenter {} has no snapshot source", target.hostname))?;
    SnapshotSource::open(target.hostname.clone(), path)
        .with_context(|| format!("opening source for vcenter {}", target.hostname))
}

async fn collect_and_write(
    target: &TargetConfig,
    config: &Config,
    sink: &Sink,
    options: BuildOptions,
) -> anyhow::Result<TargetReport> {
    let start = Instant::now();
    let source = open_source(target)?;
    let collection = collect_target(&source, config, options, Utc::now())?;

    let batch = Batch::new(config.influxdb.database.clone(), collection.records);
    sink.write(&batch)
        .await
        .with_context(|| format!("writing {} records to {}", batch.len(), sink.name()))?;

    Ok(TargetReport {
        target: collection.target,
        records: batch.len(),
        stats: collection.stats,
        duration_seconds: start.elapsed().as_secs_f64(),
    })
}

/// Collects every configured target once and writes each target's batch.
pub async fn run_once(
    config: &Config,
    sink: &Sink,
    options: BuildOptions,
) -> Result<RunSummary, RunError> {
    let start = Instant::now();
    let mut summary = RunSummary::default();

    for target in &config.vcenters {
        info!("Querying vcenter {}", target.hostname);
        match collect_and_write(target, config, sink, options).await {
            Ok(report) => {
                info!(
                    "Sent {} records for {} to {} in {:.2}s",
                    report.records,
                    report.target,
                    sink.name(),
                    report.duration_seconds
                );
                summary.succeeded.push(report);
            }
            Err(e) => {
                error!("vcenter {} failed: {:#}", target.hostname, e);
                summary.failed.push(TargetFailure {
                    target: target.hostname.clone(),
                    error: format!("{:#}", e),
                });
            }
        }
    }

    summary.duration_seconds = start.elapsed().as_secs_f64();

    if summary.succeeded.is_empty() && !summary.failed.is_empty() {
        return Err(RunError::AllTargetsFailed(summary.failed.len()));
    }
    Ok(summary)
}
