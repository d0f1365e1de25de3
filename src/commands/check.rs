//! Check command implementation.
//!
//! Validates configuration and resolves the configured counters against
//! every target.

use vsphere_influx_exporter::catalog::CounterCatalog;
use vsphere_influx_exporter::collector::open_source;
use vsphere_influx_exporter::config::{validate_effective_config, Config};
use vsphere_influx_exporter::source::MetricSource;

/// Validates configuration and counter resolution on every target.
pub fn command_check(verbose: bool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 vSphere InfluxDB Exporter - Configuration Check");
    println!("===================================================");

    let mut all_ok = true;

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    for target in &config.vcenters {
        println!("\n🖥️  Checking vcenter {}...", target.hostname);

        let source = match open_source(target) {
            Ok(source) => source,
            Err(e) => {
                println!("   ❌ {:#}", e);
                all_ok = false;
                continue;
            }
        };

        println!("   ✅ Snapshot loaded from {}", source.path().display());

        let counters = match source.counter_metadata() {
            Ok(counters) => counters,
            Err(e) => {
                println!("   ❌ Cannot read counter metadata: {}", e);
                all_ok = false;
                continue;
            }
        };
        println!("   ✅ {} counters available", counters.len());

        let catalog = CounterCatalog::build(&counters, &config.metrics);
        if catalog.is_empty() {
            println!("   ❌ None of the configured metrics resolved");
            all_ok = false;
        } else {
            println!(
                "   ✅ {} counters resolved for {} entity types",
                catalog.counter_count(),
                catalog.groups().len()
            );
        }

        if verbose {
            for group in catalog.groups() {
                println!("      {}:", group.entity_type);
                for counter in &group.counters {
                    let rollup = counter.rollup.map_or("unknown", |r| r.as_str());
                    println!(
                        "        {:>6}  {} [{}] instances={:?}",
                        counter.key, counter.name, rollup, counter.instances
                    );
                }
            }
        }

        for name in catalog.unresolved() {
            println!("   ⚠️  Metric not found on this vcenter: {}", name);
        }

        match source.discover(&catalog.entity_types()) {
            Ok(discovery) => println!(
                "   ✅ {} entities discovered ({} hosts, {} virtual machines)",
                discovery.entities.len(),
                discovery.hosts.len(),
                discovery.virtual_machines.len()
            ),
            Err(e) => {
                println!("   ❌ Inventory discovery failed: {}", e);
                all_ok = false;
            }
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - ready to collect");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
