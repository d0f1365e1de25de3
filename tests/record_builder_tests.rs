//! Integration tests for record building.
//!
//! These tests drive the counter catalog, inventory context and record
//! builder together through the public API and check the resulting records.

use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;

use vsphere_influx_exporter::catalog::CounterCatalog;
use vsphere_influx_exporter::config::{MetricDef, MetricRequest};
use vsphere_influx_exporter::inventory::InventoryContext;
use vsphere_influx_exporter::record::{BuildOptions, OutputRecord, RecordBuilder};
use vsphere_influx_exporter::source::{
    CounterInfo, EntityMetric, EntityRef, IntSeries, MetricSeries,
};

fn counter(key: i32, group: &str, name: &str, rollup: &str) -> CounterInfo {
    CounterInfo {
        key,
        group: group.into(),
        name: name.into(),
        rollup: rollup.into(),
    }
}

fn series(counter_id: i32, instance: &str, values: &[i64]) -> MetricSeries {
    MetricSeries::Int(IntSeries {
        counter_id,
        instance: instance.into(),
        values: values.to_vec(),
    })
}

fn catalog() -> CounterCatalog {
    let counters = vec![
        counter(2, "cpu", "usage", "average"),
        counter(10, "datastore", "read", "average"),
        counter(11, "datastore", "write", "average"),
        counter(20, "disk", "numberReadAveraged", "average"),
    ];
    let definitions = [
        "cpu.usage.average",
        "datastore.read.average",
        "datastore.write.average",
        "disk.numberReadAveraged.average",
    ]
    .iter()
    .map(|m| MetricDef {
        metric: m.to_string(),
        instances: "*".into(),
    })
    .collect();
    let requests = vec![MetricRequest {
        object_types: vec!["VirtualMachine".into()],
        definitions,
    }];
    CounterCatalog::build(&counters, &requests)
}

fn inventory() -> InventoryContext {
    let mut ctx = InventoryContext::new("vc01");
    ctx.insert_name(&vm(), "web01");
    ctx.insert_tag(&vm(), "cluster", "prod");
    ctx
}

fn vm() -> EntityRef {
    EntityRef::new("VirtualMachine", "vm-42")
}

fn build(metrics: &[EntityMetric]) -> Vec<OutputRecord> {
    let catalog = catalog();
    let inventory = inventory();
    let ts = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
    RecordBuilder::new(&catalog, &inventory, BuildOptions::default())
        .build(metrics, ts)
        .records
}

#[test]
fn test_datastore_instances_merge_into_primary_record() {
    let metrics = vec![EntityMetric {
        entity: vm(),
        series: vec![
            series(2, "", &[10, 20, 30]),
            series(10, "ds-a", &[100]),
            series(10, "ds-b", &[300]),
        ],
    }];

    let records = build(&metrics);

    assert_eq!(records.len(), 1);
    let primary = &records[0];
    assert_eq!(primary.measurement, "virtualmachine");
    assert_eq!(primary.fields["cpu_usage_average"], 20);
    // Last datastore instance wins.
    assert_eq!(primary.fields["datastore_read_average"], 300);
    assert!(!primary.tags.contains_key("instance"));
}

#[test]
fn test_disk_instances_become_separate_records() {
    let metrics = vec![EntityMetric {
        entity: vm(),
        series: vec![
            series(2, "", &[50]),
            series(20, "0:0", &[4, 6]),
            series(20, "0:1", &[-1, -1]),
        ],
    }];

    let records = build(&metrics);

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].measurement, "virtualmachine");

    let disks: Vec<&OutputRecord> = records.iter().filter(|r| r.measurement == "disk").collect();
    assert_eq!(disks.len(), 2);

    let expected_tags = |instance: &str| {
        BTreeMap::from([
            ("cluster".to_string(), "prod".to_string()),
            ("host".to_string(), "vc01".to_string()),
            ("instance".to_string(), instance.to_string()),
            ("name".to_string(), "web01".to_string()),
        ])
    };
    assert_eq!(disks[0].tags, expected_tags("0:0"));
    assert_eq!(disks[0].fields["disk_numberreadaveraged_average"], 5);
    assert_eq!(disks[1].tags, expected_tags("0:1"));
    assert_eq!(disks[1].fields["disk_numberreadaveraged_average"], -1);
}

#[test]
fn test_unknown_counter_is_skipped() {
    let catalog = catalog();
    let inventory = inventory();
    let metrics = vec![EntityMetric {
        entity: vm(),
        series: vec![series(2, "", &[7]), series(999, "", &[1, 2, 3])],
    }];

    let output = RecordBuilder::new(&catalog, &inventory, BuildOptions::default())
        .build(&metrics, Utc::now());

    assert_eq!(output.records.len(), 1);
    assert_eq!(output.records[0].fields.len(), 1);
    assert_eq!(output.stats.unknown_counters, 1);
}

#[test]
fn test_entity_without_series_produces_no_record() {
    let metrics = vec![EntityMetric {
        entity: vm(),
        series: Vec::new(),
    }];

    assert!(build(&metrics).is_empty());
}

#[test]
fn test_instance_only_entity_skips_primary_record() {
    let metrics = vec![EntityMetric {
        entity: vm(),
        series: vec![series(20, "0:0", &[1])],
    }];

    let records = build(&metrics);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].measurement, "disk");
}

#[test]
fn test_unnamed_entity_falls_back_to_id() {
    let other = EntityRef::new("VirtualMachine", "vm-7");
    let metrics = vec![EntityMetric {
        entity: other,
        series: vec![series(2, "", &[1])],
    }];

    let records = build(&metrics);

    assert_eq!(records[0].tags["name"], "vm-7");
    assert_eq!(records[0].tags["host"], "vc01");
}

#[test]
fn test_build_is_idempotent() {
    let metrics = vec![EntityMetric {
        entity: vm(),
        series: vec![
            series(2, "", &[3, 4]),
            series(20, "0:1", &[9]),
            series(20, "0:0", &[8]),
            series(11, "ds-a", &[2]),
        ],
    }];

    assert_eq!(build(&metrics), build(&metrics));
}
