//! Background daemon that watches Vault's seal state and restores it with
//! stored key shares, reporting the observed state to a metrics collector.

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use sealguard_core::{
    config::{SealguardConfig, DEFAULT_CONFIG_PATH},
    logging, CycleReport, Monitor, RecoveryOutcome,
};
use sealguard_vault::{GraphiteQueueSink, VaultClient};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::{select, time};

/// Command-line options; every flag overrides its configuration counterpart.
#[derive(Parser, Debug)]
#[command(
    name = "sealguardd",
    version,
    about = "Watch a Vault instance for seal events and auto-unseal it from locally stored key shares."
)]
struct Cli {
    /// Path to the sealguard configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Hostname used in the emitted metric path.
    #[arg(long)]
    hostname: Option<String>,

    /// Collector endpoint; may be given multiple times, tried in order before
    /// the configured endpoints.
    #[arg(long = "collector")]
    collectors: Vec<String>,

    /// Base URL of the watched Vault instance.
    #[arg(long)]
    vault_addr: Option<String>,

    /// Seconds between poll cycles.
    #[arg(long)]
    interval_secs: Option<u64>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    if let Err(err) = run().await {
        error!("daemon exit: {err:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    logging::init("info");
    let cli = Cli::parse();

    let mut config = SealguardConfig::load_or_default(&cli.config)
        .with_context(|| format!("load config {}", cli.config.display()))?;
    apply_overrides(&mut config, &cli);

    for issue in config.validate() {
        warn!("configuration issue: {issue}");
    }

    info!(
        "sealguard daemon booting (vault: {}, shares: {}, collectors: {}, interval: {}s)",
        config.vault.addr,
        config.unseal.share_dir.display(),
        config.metrics.endpoints.len(),
        config.monitor.interval_secs
    );

    let target = VaultClient::from_config(&config).context("initialise vault client")?;
    let sink = GraphiteQueueSink::new(Duration::from_secs(config.metrics.timeout_secs))
        .context("initialise collector sink")?;
    let interval = Duration::from_secs(config.monitor.interval_secs.max(1));
    let monitor = Monitor::new(&config, target, sink);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(wait_for_shutdown(shutdown_tx));

    monitor_loop(monitor, interval, shutdown_rx).await;
    info!("sealguard daemon terminated");
    Ok(())
}

fn apply_overrides(config: &mut SealguardConfig, cli: &Cli) {
    if let Some(hostname) = &cli.hostname {
        config.metrics.hostname = hostname.clone();
    }
    if let Some(addr) = &cli.vault_addr {
        config.vault.addr = addr.clone();
    }
    if let Some(interval) = cli.interval_secs {
        config.monitor.interval_secs = interval;
    }
    if !cli.collectors.is_empty() {
        let mut endpoints = cli.collectors.clone();
        endpoints.extend(config.metrics.endpoints.drain(..));
        config.metrics.endpoints = endpoints;
    }
}

/// Poll on a fixed cadence until shutdown is requested. A cycle already in
/// flight completes; the shutdown flag is only consulted between cycles.
async fn monitor_loop(
    monitor: Monitor<VaultClient, GraphiteQueueSink>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {}
        }
        if *shutdown.borrow() {
            break;
        }

        match tokio::task::block_in_place(|| monitor.run_cycle()) {
            Ok(report) => log_cycle(&report),
            Err(err) => warn!("cycle skipped: {err}"),
        }
    }
}

fn log_cycle(report: &CycleReport) {
    match &report.recovery {
        None => info!(
            "service {}; metric value {} delivered to {}",
            report.state,
            report.metric_value,
            report.delivered_to.as_deref().unwrap_or("no collector")
        ),
        Some(outcome) => {
            let summary = match outcome {
                RecoveryOutcome::Unsealed { share, submitted } => {
                    format!("recovered after {submitted} submissions (share {share})")
                }
                RecoveryOutcome::InsufficientShares {
                    available,
                    required,
                } => format!("recovery skipped: {available} of {required} shares available"),
                RecoveryOutcome::AllSharesFailed { attempted } => {
                    format!("recovery failed across all {attempted} shares")
                }
            };
            info!(
                "service {}; {summary}; metric value {} delivered to {}",
                report.state,
                report.metric_value,
                report.delivered_to.as_deref().unwrap_or("no collector")
            );
        }
    }
}

/// Flip the shutdown flag on SIGTERM or ctrl-c.
///
/// Must hold `tx` until a signal actually arrives: dropping the sender makes
/// `changed()` resolve immediately on every loop iteration, turning the poll
/// loop into a busy loop. If the SIGTERM handler cannot be installed we keep
/// waiting on ctrl-c alone.
async fn wait_for_shutdown(tx: watch::Sender<bool>) {
    let mut term = signal(SignalKind::terminate())
        .map_err(|err| error!("failed to install SIGTERM handler: {err}"))
        .ok();

    select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = async {
            match term.as_mut() {
                Some(term) => {
                    term.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        } => {}
    }

    info!("received shutdown signal; finishing current cycle");
    let _ = tx.send(true);
}
