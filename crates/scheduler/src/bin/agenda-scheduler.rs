//! agenda-scheduler: publishes reminders for due events and prunes old ones.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use agenda_core::config::{load_dotenv, Config};
use agenda_queue::ZmqPublisher;
use agenda_scheduler::{Scheduler, SchedulerConfig};
use agenda_storage::open_store;

// ── CLI ─────────────────────────────────────────────────────────────

/// Notification scheduler: polls the event store and feeds the broker.
#[derive(Parser, Debug)]
#[command(name = "agenda-scheduler", version, about)]
struct Cli {
    /// Config profile (`{PROFILE}_{KEY}` env overrides).
    #[arg(long, env = "AGENDA_PROFILE", default_value = "")]
    profile: String,

    /// Log filter used when RUST_LOG is unset; overrides LOG_LEVEL.
    #[arg(long)]
    log_level: Option<String>,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    let cli = Cli::parse();
    let config = Config::for_profile(&cli.profile);

    let level = cli.log_level.as_deref().unwrap_or(&config.logger.level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();

    config.validate()?;
    config.log_summary();

    let store = open_store(config.storage.mode()?, &config.storage, &config.postgres).await?;
    let publisher = Arc::new(ZmqPublisher::bind(&config.broker.endpoint, config.broker.queue.as_str()).await?);
    let scheduler_config = SchedulerConfig::from_settings(&config.scheduler)?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let scheduler = Scheduler::new(store.clone(), publisher, scheduler_config);
    let handle = tokio::spawn(scheduler.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    shutdown_tx.send(true).ok();
    handle.await?;

    store.close().await;
    info!("agenda-scheduler exited cleanly");
    Ok(())
}
