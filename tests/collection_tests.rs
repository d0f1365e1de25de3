//! Integration tests for snapshot-backed collection.
//!
//! These tests write a small snapshot to a temporary directory and run the
//! full collection path against it.

use chrono::{TimeZone, Utc};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

use vsphere_influx_exporter::collector::{collect_target, open_source, run_once, RunError};
use vsphere_influx_exporter::config::{Config, MetricDef, MetricRequest, TargetConfig};
use vsphere_influx_exporter::record::BuildOptions;
use vsphere_influx_exporter::sink::{encode_batch, Sink, StdoutSink};
use vsphere_influx_exporter::source::{
    ClusterInfo, CounterInfo, Discovery, EntityMetric, EntityRef, HostSummary, IntSeries,
    ManagedEntity, MetricSeries, ResourcePoolInfo, Snapshot, VmSummary,
};

fn vm() -> EntityRef {
    EntityRef::new("VirtualMachine", "vm-1")
}

fn host() -> EntityRef {
    EntityRef::new("HostSystem", "host-1")
}

fn int(counter_id: i32, instance: &str, values: &[i64]) -> MetricSeries {
    MetricSeries::Int(IntSeries {
        counter_id,
        instance: instance.into(),
        values: values.to_vec(),
    })
}

fn snapshot() -> Snapshot {
    Snapshot {
        version: "1.0".into(),
        generated_at: "2024-03-01T08:00:00Z".into(),
        counters: vec![
            CounterInfo {
                key: 2,
                group: "cpu".into(),
                name: "usage".into(),
                rollup: "average".into(),
            },
            CounterInfo {
                key: 6,
                group: "cpu".into(),
                name: "ready".into(),
                rollup: "summation".into(),
            },
        ],
        discovery: Discovery {
            entities: vec![
                ManagedEntity {
                    entity: vm(),
                    name: "Web01.corp.local".into(),
                },
                ManagedEntity {
                    entity: host(),
                    name: "esx01.corp.local".into(),
                },
            ],
            virtual_machines: vec![VmSummary {
                entity: vm(),
                host: Some(host()),
                vm_path_name: Some("[ds01] web01/web01.vmx".into()),
            }],
            hosts: vec![HostSummary {
                entity: host(),
                name: "esx01.corp.local".into(),
                cpu_threads: 32,
            }],
            clusters: vec![ClusterInfo {
                entity: EntityRef::new("ClusterComputeResource", "domain-c7"),
                name: "prod".into(),
                vms: vec![vm()],
            }],
            resource_pools: vec![ResourcePoolInfo {
                entity: EntityRef::new("ResourcePool", "resgroup-9"),
                name: "gold".into(),
                vms: vec![vm()],
                cpu_limit: 4000,
                memory_limit: -1,
            }],
        },
        samples: vec![
            EntityMetric {
                entity: vm(),
                series: vec![int(2, "", &[10, 20, 30]), int(6, "", &[5, -1, 7])],
            },
            EntityMetric {
                entity: host(),
                series: vec![int(2, "", &[40, 60])],
            },
        ],
    }
}

fn write_snapshot(path: &Path) {
    let json = serde_json::to_string_pretty(&snapshot()).expect("snapshot serializes");
    fs::write(path, json).expect("Failed to write snapshot");
}

fn config(snapshot: &Path) -> Config {
    Config {
        domain: ".corp.local".into(),
        vcenters: vec![TargetConfig {
            hostname: "vc01.corp.local".into(),
            snapshot: Some(snapshot.to_path_buf()),
            ..Default::default()
        }],
        metrics: vec![MetricRequest {
            object_types: vec!["VirtualMachine".into(), "HostSystem".into()],
            definitions: vec![
                MetricDef {
                    metric: "cpu.usage.average".into(),
                    instances: "".into(),
                },
                MetricDef {
                    metric: "cpu.ready.summation".into(),
                    instances: "".into(),
                },
            ],
        }],
        ..Config::default()
    }
}

#[test]
fn test_collect_target_from_snapshot() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("vc01.json");
    write_snapshot(&path);
    let config = config(&path);

    let source = open_source(&config.vcenters[0]).expect("snapshot opens");
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
    let collection =
        collect_target(&source, &config, BuildOptions::default(), now).expect("collection works");

    assert_eq!(collection.target, "vc01");
    assert_eq!(collection.queried_entities, 2);
    assert_eq!(collection.records.len(), 3);

    let vm = collection
        .records
        .iter()
        .find(|r| r.measurement == "virtualmachine")
        .expect("vm record");
    assert_eq!(vm.tags["host"], "vc01");
    assert_eq!(vm.tags["name"], "web01");
    assert_eq!(vm.tags["cluster"], "prod");
    assert_eq!(vm.tags["respool"], "gold");
    assert_eq!(vm.tags["datastore"], "ds01");
    assert_eq!(vm.tags["esx"], "esx01.corp.local");
    assert_eq!(vm.fields["cpu_usage_average"], 20);
    assert_eq!(vm.fields["cpu_ready_summation"], 12);
    assert_eq!(vm.timestamp, now);

    let host = collection
        .records
        .iter()
        .find(|r| r.measurement == "hostsystem")
        .expect("host record");
    assert_eq!(host.tags["name"], "esx01");
    assert_eq!(host.fields["cpu_usage_average"], 50);
    assert_eq!(host.fields["cpu_corecount_total"], 32);

    let pool = collection
        .records
        .iter()
        .find(|r| r.measurement == "resourcepool")
        .expect("pool record");
    assert_eq!(pool.tags["pool_name"], "gold");
    assert_eq!(pool.fields["cpu_limit"], 4000);
    assert_eq!(pool.fields["memory_limit"], -1);

    let body = encode_batch(&collection.records);
    assert_eq!(body.lines().count(), 3);
    assert!(body.contains("cpu_usage_average=20i"));
}

#[tokio::test]
async fn test_run_once_with_stdout_sink() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("vc01.json");
    write_snapshot(&path);
    let config = config(&path);
    let sink = Sink::Stdout(StdoutSink);

    let summary = run_once(&config, &sink, BuildOptions::default())
        .await
        .expect("run succeeds");

    assert_eq!(summary.succeeded.len(), 1);
    assert!(summary.failed.is_empty());
    assert_eq!(summary.records(), 3);
}

#[tokio::test]
async fn test_run_once_keeps_going_past_failed_target() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("vc01.json");
    write_snapshot(&path);
    let mut config = config(&path);
    config.vcenters.insert(
        0,
        TargetConfig {
            hostname: "vc02".into(),
            snapshot: Some(dir.path().join("missing.json")),
            ..Default::default()
        },
    );

    let summary = run_once(&config, &Sink::Stdout(StdoutSink), BuildOptions::default())
        .await
        .expect("one target still succeeds");

    assert_eq!(summary.succeeded.len(), 1);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].target, "vc02");
}

#[tokio::test]
async fn test_run_once_fails_when_every_target_fails() {
    let dir = tempdir().expect("Failed to create temp dir");
    let config = config(&dir.path().join("missing.json"));

    let err = run_once(&config, &Sink::Stdout(StdoutSink), BuildOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::AllTargetsFailed(1)));
}
