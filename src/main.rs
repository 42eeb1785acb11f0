use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use lot_watcher::extractor::Extractor;
use lot_watcher::fetcher::{Fetcher, HttpFetcher};
use lot_watcher::monitor::Monitor;
use lot_watcher::plugins::notifiers::{LogNotifier, TelegramClient, TelegramNotifier};
use lot_watcher::plugins::PluginManager;
use lot_watcher::scheduler::MonitorScheduler;
use lot_watcher::utils::alerts::{spawn_alert_worker, AdminAlertLayer};
use lot_watcher::utils::logging::init_tracing;
use lot_watcher::AppConfig;

#[derive(Parser)]
#[command(name = "lot-watcher", version, about = "Watches marketplace listings and reports new lots")]
struct Cli {
    /// Configuration file, replaces the config/ directory lookup
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Minutes between checks
    #[arg(short, long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Monitor the configured pages (default)
    Run {
        /// Run a single check and exit
        #[arg(long)]
        once: bool,
    },
    /// Print the lots found on a page as JSON
    Extract { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        AppConfig::from_env(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(interval) = cli.interval {
        config.monitor.check_interval_minutes = interval;
    }

    let bot_token = config
        .telegram
        .bot_token
        .clone()
        .filter(|token| !token.trim().is_empty());

    let (alert_layer, alert_receiver) = match &bot_token {
        Some(_) if config.telegram.alerts_enabled && !config.telegram.chat_ids.is_empty() => {
            let (layer, receiver) = AdminAlertLayer::new();
            (Some(layer), Some(receiver))
        }
        _ => (None, None),
    };
    let _log_guard = init_tracing(&config.logging, alert_layer)?;

    if let (Some(token), Some(receiver)) = (&bot_token, alert_receiver) {
        let client = TelegramClient::new(&config.telegram.api_base, token)?;
        spawn_alert_worker(client, config.telegram.chat_ids.clone(), receiver);
    }

    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config.fetcher)?);
    let extractor = Extractor::new(config.extractor.clone())?;

    match cli.command.unwrap_or(Command::Run { once: false }) {
        Command::Extract { url } => {
            let markup = fetcher.fetch(&url).await?;
            let records = extractor.extract_markup(&markup);
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(())
        }
        Command::Run { once } => run(config, bot_token.is_some(), fetcher, extractor, once).await,
    }
}

async fn run(
    config: AppConfig,
    telegram_enabled: bool,
    fetcher: Arc<dyn Fetcher>,
    extractor: Extractor,
    once: bool,
) -> Result<()> {
    info!("Starting lot-watcher...");

    let notifiers = PluginManager::new();
    if telegram_enabled {
        notifiers
            .register_notifier(Box::new(TelegramNotifier::new(&config.telegram)?))
            .await?;
    } else {
        warn!("No bot token configured, new lots will only be logged");
        notifiers.register_notifier(Box::new(LogNotifier::new())).await?;
    }
    for plugin_type in notifiers.test_connections().await {
        warn!("Notifier {} is not reachable, deliveries will be retried per lot", plugin_type);
    }

    let pages: Vec<_> = config.enabled_pages().cloned().collect();
    for page in &pages {
        info!("Monitoring {}", page.display_name());
    }
    let monitor = Arc::new(Monitor::new(fetcher, extractor, notifiers.clone(), pages));

    if once {
        let report = monitor.check_all().await;
        info!(
            "Single check finished: {} items found, {} new",
            report.items_found, report.new_items
        );
        notifiers.shutdown().await?;
        return Ok(());
    }

    let mut scheduler = MonitorScheduler::new(monitor).await?;
    scheduler
        .launch(
            config.monitor.check_interval_minutes,
            config.monitor.run_on_start,
        )
        .await?;

    info!(
        "Watcher started. Monitoring every {} minutes",
        config.monitor.check_interval_minutes
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    scheduler.shutdown().await?;
    notifiers.shutdown().await?;
    Ok(())
}
