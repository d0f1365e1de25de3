//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use vsphere_influx_exporter::cli::ConfigFormat;
use vsphere_influx_exporter::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::template();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("vsphere-influx-exporter.yaml"),
    };

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# vSphere InfluxDB Exporter Configuration
# ========================================
#
# Collection
# ----------
# interval: 60                 # Seconds between runs, also the query window
# domain: ".example.com"       # Suffix stripped from entity and vcenter names
# unknown_rollup: sentinel     # sentinel (-1) or skip for unknown rollup kinds
#
# Targets
# -------
# vcenters:                    # Legacy key: VCenters
#   - hostname: vc01           # Reported as the "host" tag
#     username: user
#     password: secret
#     snapshot: /path/to.json  # Recorded target to replay
#
# Metrics
# -------
# metrics:                     # Legacy key: Metrics
#   - object_types: [VirtualMachine, HostSystem]
#     definitions:
#       - metric: cpu.usage.average  # group.name.rollup
#         instances: ""              # "" aggregate, "*" all instances
#
# InfluxDB
# --------
# influxdb:                    # Legacy key: InfluxDB
#   url: http://localhost:8086
#   username: null
#   password: null
#   database: vsphere
#   timeout_seconds: 30
"#;

    format!("{comments}\n{yaml}")
}
