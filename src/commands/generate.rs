//! Generate snapshot command implementation.
//!
//! Generates synthetic target snapshots for dry runs and testing.

use chrono::Utc;
use rand::Rng;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use vsphere_influx_exporter::config::default_metrics;
use vsphere_influx_exporter::rollup::SENTINEL;
use vsphere_influx_exporter::source::{
    ClusterInfo, CounterInfo, Discovery, EntityMetric, EntityRef, HostSummary, IntSeries,
    ManagedEntity, MetricSeries, ResourcePoolInfo, Snapshot, VmSummary,
};

const SNAPSHOT_VERSION: &str = "1.0";

// First counter key handed out; real vCenters start low as well.
const FIRST_COUNTER_KEY: i32 = 2;

const DATASTORES: [&str; 2] = ["datastore1", "san-lun-01"];

/// Generates a synthetic snapshot JSON file.
pub fn command_generate_snapshot(
    output: PathBuf,
    hosts: usize,
    vms_per_host: usize,
    samples: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    debug!(
        "Generating snapshot: hosts={}, vms_per_host={}, samples={}, output={}",
        hosts,
        vms_per_host,
        samples,
        output.display()
    );

    let mut rng = rand::thread_rng();
    let counters = generate_counters();
    let mut discovery = Discovery::default();
    let mut metrics = Vec::new();

    let cluster = EntityRef::new("ClusterComputeResource", "domain-c1");
    let pool = EntityRef::new("ResourcePool", "resgroup-1");
    let mut cluster_vms = Vec::new();

    for h in 1..=hosts {
        let host = EntityRef::new("HostSystem", format!("host-{}", h));
        let host_name = format!("esx{:02}.example.com", h);
        discovery.entities.push(ManagedEntity {
            entity: host.clone(),
            name: host_name.clone(),
        });
        discovery.hosts.push(HostSummary {
            entity: host.clone(),
            name: host_name,
            cpu_threads: rng.gen_range(16..=128),
        });
        metrics.push(EntityMetric {
            entity: host.clone(),
            series: entity_series(&mut rng, &counters, "HostSystem", samples),
        });

        for v in 1..=vms_per_host {
            let vm = EntityRef::new("VirtualMachine", format!("vm-{}{:02}", h, v));
            let vm_name = format!("VM-{}{:02}.example.com", h, v);
            let datastore = DATASTORES[rng.gen_range(0..DATASTORES.len())];
            discovery.entities.push(ManagedEntity {
                entity: vm.clone(),
                name: vm_name.clone(),
            });
            discovery.virtual_machines.push(VmSummary {
                entity: vm.clone(),
                host: Some(host.clone()),
                vm_path_name: Some(format!("[{}] {}/{}.vmx", datastore, vm_name, vm_name)),
            });
            metrics.push(EntityMetric {
                entity: vm.clone(),
                series: entity_series(&mut rng, &counters, "VirtualMachine", samples),
            });
            cluster_vms.push(vm);
        }
    }

    discovery.clusters.push(ClusterInfo {
        entity: cluster,
        name: "Cluster01".to_string(),
        vms: cluster_vms.clone(),
    });
    discovery.resource_pools.push(ResourcePoolInfo {
        entity: pool,
        name: "Production".to_string(),
        vms: cluster_vms.into_iter().step_by(2).collect(),
        cpu_limit: 24_000,
        memory_limit: SENTINEL,
    });

    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION.to_string(),
        generated_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        counters: counters.into_iter().map(|(info, _)| info).collect(),
        discovery,
        samples: metrics,
    };

    let json_content = serde_json::to_string_pretty(&snapshot)?;
    fs::write(&output, &json_content)?;

    println!(
        "✅ Generated snapshot: {} entities, {} counters in {}",
        snapshot.discovery.entities.len(),
        snapshot.counters.len(),
        output.display()
    );

    Ok(())
}

/// Counter metadata for every default metric, paired with the entity types
/// requesting it.
fn generate_counters() -> Vec<(CounterInfo, Vec<String>)> {
    let mut counters: Vec<(CounterInfo, Vec<String>)> = Vec::new();
    let mut next_key = FIRST_COUNTER_KEY;

    for request in default_metrics() {
        for def in &request.definitions {
            if let Some((_, types)) = counters
                .iter_mut()
                .find(|(c, _)| c.identifier() == def.metric)
            {
                types.extend(request.object_types.iter().cloned());
                continue;
            }

            let mut parts = def.metric.splitn(3, '.');
            let (Some(group), Some(name), Some(rollup)) = (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            counters.push((
                CounterInfo {
                    key: next_key,
                    group: group.to_string(),
                    name: name.to_string(),
                    rollup: rollup.to_string(),
                },
                request.object_types.clone(),
            ));
            next_key += 1;
        }
    }

    counters
}

/// Instances reported for a counter group.
fn instances_for(group: &str, entity_type: &str) -> Vec<&'static str> {
    match (group, entity_type) {
        ("net", _) => vec!["", "vmnic0", "vmnic1"],
        ("disk", "HostSystem") => vec!["", "naa.600a0b80001111550000cafe", "mpx.vmhba32:C0:T0:L0"],
        ("datastore", _) => vec!["4f1e2c3d-0a1b2c3d-4e5f-001122334455"],
        _ => vec![""],
    }
}

fn entity_series(
    rng: &mut impl Rng,
    counters: &[(CounterInfo, Vec<String>)],
    entity_type: &str,
    samples: usize,
) -> Vec<MetricSeries> {
    let mut series = Vec::new();
    for (info, types) in counters {
        if !types.iter().any(|t| t == entity_type) {
            continue;
        }
        for instance in instances_for(&info.group, entity_type) {
            series.push(MetricSeries::Int(IntSeries {
                counter_id: info.key,
                instance: instance.to_string(),
                values: random_values(rng, &info.group, samples),
            }));
        }
    }
    series
}

/// Random samples with the occasional missing (-1) entry.
fn random_values(rng: &mut impl Rng, group: &str, samples: usize) -> Vec<i64> {
    let upper = match group {
        "cpu" | "mem" => 10_000,
        "net" => 125_000,
        _ => 5_000,
    };
    (0..samples)
        .map(|_| {
            if rng.gen_bool(0.05) {
                SENTINEL
            } else {
                rng.gen_range(0..upper)
            }
        })
        .collect()
}
