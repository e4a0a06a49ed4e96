//! fleetscaled — run one autoscaling cycle for the web fleet.
//!
//! # Usage
//!
//! ```text
//! fleetscaled --config /etc/fleetscale/fleetscale.toml
//! fleetscaled --dry-run
//! ```
//!
//! Intended to be invoked periodically by an external scheduler (cron,
//! systemd timer). Each invocation observes, decides, reconciles, and exits.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use fleetscale_core::ScalerConfig;
use fleetscale_metrics::MetricsProbe;
use fleetscale_notify::{Notifier, TelegramNotifier};
use fleetscaled::{ControlLoop, NoLock};

const DEFAULT_CONFIG: &str = "fleetscale.toml";

#[derive(Parser)]
#[command(name = "fleetscaled", about = "Rule-based autoscaler for the web fleet")]
struct Cli {
    /// Configuration file. A missing default file means built-in defaults.
    #[arg(long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Sample and decide, but do not reconcile anything.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_tracing(config.log_file.as_deref())?;

    info!(config = ?cli.config, dry_run = cli.dry_run, "fleetscaled starting");

    let telegram = TelegramNotifier::from_env(&config.notify);
    if !telegram.is_enabled() {
        warn!("notifications disabled");
    }
    let notifier: Arc<dyn Notifier> = Arc::new(telegram);

    let probe = MetricsProbe::new(&config.metrics, notifier.clone())
        .context("failed to build metrics probe")?;

    let control = ControlLoop::new(&config, Arc::new(probe), notifier).dry_run(cli.dry_run);
    let report = control.run_locked(&NoLock).await?;

    match &report.reconcile {
        Some(r) if !r.is_complete() => {
            warn!(decision = %report.decision, pending = ?r.pending(), "cycle ended with partial reconciliation");
        }
        _ => info!(decision = %report.decision, "cycle complete"),
    }

    Ok(())
}

/// Read the config file. Only the default path may be absent.
fn load_config(path: &Path) -> anyhow::Result<ScalerConfig> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG) {
        return Ok(ScalerConfig::default());
    }
    Ok(ScalerConfig::from_file(path)?)
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,fleetscaled=debug,fleetscale=debug"));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}
