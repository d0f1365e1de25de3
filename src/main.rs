//! vsphere-influx-exporter
//!
//! Collects vSphere performance counters and writes them to InfluxDB.
//! This is the main entry point that runs the collection loop and handles subcommands.

mod commands;

use clap::Parser;
use std::time::Duration;
use tokio::signal;
use tracing::{debug, error, info, Level};

use commands::{command_check, command_config, command_generate_snapshot, command_test};
use vsphere_influx_exporter::cli::{Args, Commands, LogLevel};
use vsphere_influx_exporter::collector::{run_once, RunError};
use vsphere_influx_exporter::config::{
    resolve_config, show_config, validate_effective_config, Config,
};
use vsphere_influx_exporter::record::BuildOptions;
use vsphere_influx_exporter::sink::{InfluxSink, Sink, StdoutSink};
use vsphere_influx_exporter::stats::CollectionStats;

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => None,
        LogLevel::Error => Some(Level::ERROR),
        LogLevel::Warn => Some(Level::WARN),
        LogLevel::Info => Some(Level::INFO),
        LogLevel::Debug => Some(Level::DEBUG),
        LogLevel::Trace => Some(Level::TRACE),
    };
    let Some(log_level) = log_level else {
        return;
    };

    // Records go to stdout on dry runs, so logs always go to stderr.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {:?}", args.log_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Completes when SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Runs one collection and accounts it. Returns false when every target failed.
async fn collect(
    config: &Config,
    sink: &Sink,
    options: BuildOptions,
    stats: &mut CollectionStats,
) -> bool {
    match run_once(config, sink, options).await {
        Ok(summary) => {
            stats.record_run(&summary);
            stats.log_summary();
            true
        }
        Err(RunError::AllTargetsFailed(targets)) => {
            error!("All {} targets failed in this run", targets);
            stats.record_failed_run(targets);
            stats.log_summary();
            false
        }
    }
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        show_config(&config, args.config_format.clone())?;
        return Ok(());
    }

    setup_logging(&args);

    // Handle subcommands
    if let Some(command) = &args.command {
        match command {
            Commands::Config {
                output,
                format,
                commented,
            } => return command_config(output.clone(), format.clone(), *commented),
            Commands::GenerateSnapshot {
                output,
                hosts,
                vms_per_host,
                samples,
            } => {
                return command_generate_snapshot(output.clone(), *hosts, *vms_per_host, *samples)
            }
            _ => {
                // Other commands need config validation
            }
        }

        let config = load_validated_config(&args)?;
        let options = BuildOptions {
            verbose: args.debug,
            unknown_rollup: config.unknown_rollup,
        };

        return match command {
            Commands::Check { verbose } => command_check(*verbose, &config),
            Commands::Test { format } => command_test(format.clone(), options, &config),
            Commands::Config { .. } => unreachable!("Config handled above"),
            Commands::GenerateSnapshot { .. } => unreachable!("GenerateSnapshot handled above"),
        };
    }

    let config = load_validated_config(&args)?;

    info!("Starting vsphere-influx-exporter");

    let sink = if args.dry_run {
        info!("Dry run: writing line protocol to stdout");
        Sink::Stdout(StdoutSink)
    } else {
        debug!(
            "Writing to InfluxDB at {} database {}",
            config.influxdb.url, config.influxdb.database
        );
        Sink::Influx(InfluxSink::new(&config.influxdb)?)
    };

    let options = BuildOptions {
        verbose: args.debug,
        unknown_rollup: config.unknown_rollup,
    };
    let mut stats = CollectionStats::new();

    if args.once {
        if !collect(&config, &sink, options, &mut stats).await {
            std::process::exit(1);
        }
        return Ok(());
    }

    info!(
        "Collecting {} vcenters every {}s",
        config.vcenters.len(),
        config.interval
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(config.interval));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                collect(&config, &sink, options, &mut stats).await;
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received, exiting...");
                break;
            }
        }
    }

    info!("vsphere-influx-exporter stopped gracefully");
    Ok(())
}
