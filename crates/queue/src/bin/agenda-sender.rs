//! agenda-sender: consumes the notification queue and delivers reminders.
//!
//! Delivery is a structured log line per notification.

use clap::Parser;
use tracing::{error, info};

use agenda_core::config::{load_dotenv, Config};
use agenda_core::time::format_timestamp;
use agenda_queue::{NotificationConsumer, ZmqConsumer};

// ── CLI ─────────────────────────────────────────────────────────────

/// Notification sender: reads reminders from the broker and delivers them.
#[derive(Parser, Debug)]
#[command(name = "agenda-sender", version, about)]
struct Cli {
    /// Config profile (`{PROFILE}_{KEY}` env overrides).
    #[arg(long, env = "AGENDA_PROFILE", default_value = "")]
    profile: String,

    /// Broker endpoint to connect to; overrides BROKER_ENDPOINT.
    #[arg(long)]
    endpoint: Option<String>,

    /// Queue to consume; overrides BROKER_QUEUE.
    #[arg(long)]
    queue: Option<String>,

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

    let endpoint = cli.endpoint.unwrap_or_else(|| config.broker.endpoint.clone());
    let queue = cli.queue.unwrap_or_else(|| config.broker.queue.clone());

    let consumer = ZmqConsumer::new(endpoint.as_str());
    let mut stream = consumer.consume(&queue).await?;
    info!(endpoint = %endpoint, queue = %queue, "agenda-sender started");

    loop {
        tokio::select! {
            item = stream.recv() => match item {
                Some(Ok(notification)) => info!(
                    id = %notification.id,
                    title = %notification.title,
                    date_start = %format_timestamp(&notification.date_start),
                    recipient = %notification.recipient,
                    "Received notification"
                ),
                Some(Err(e)) => error!(error = %e, "failed to read notification"),
                None => {
                    error!("notification stream closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    info!("agenda-sender exited cleanly");
    Ok(())
}
