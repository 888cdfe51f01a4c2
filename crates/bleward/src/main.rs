use std::path::PathBuf;

use anyhow::Context;
use bleward::config::LoggingConfig;
use bleward::engine::scheduler;
use bleward::integrations::notify;
use bleward::integrations::scanner::CommandScanner;
use bleward::Config;
use bleward::Monitor;
use clap::Parser;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

/// Periodic BLE discovery with known/unknown device triage
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "bleward.toml")]
    config: PathBuf,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    init_tracing(&config.logging);

    tracing::info!("bleward starting");
    tracing::info!("Loaded config from: {}", args.config.display());

    let scanner = CommandScanner::new(&config.scanner);
    let notifier = notify::from_config(&config.notify).with_context(|| {
        format!("Failed to set up {} notifications", config.notify.channel)
    })?;
    let mut monitor = Monitor::open(
        &config.registry,
        Box::new(scanner),
        notifier,
        config.notify.events(),
    )
    .context("Failed to open device registries")?;

    // Listen before the first cycle; Ctrl+C is acted on between cycles only
    let shutdown = scheduler::listen_for_shutdown(tokio::signal::ctrl_c());

    if args.once {
        let report = monitor.run_cycle().await?;
        tracing::info!(
            "Single cycle complete: {} devices ({} known, {} new unknown)",
            report.observed,
            report.known,
            report.new_unknowns
        );
        return Ok(());
    }

    tracing::info!("Press Ctrl+C to exit");
    scheduler::run(&mut monitor, &config.schedule, shutdown).await;

    tracing::info!("bleward shutdown complete");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = Targets::new()
        .with_default(LevelFilter::from(logging.level))
        .with_targets(
            logging
                .overrides
                .iter()
                .map(|(target, level)| (target.clone(), LevelFilter::from(*level))),
        );

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}
