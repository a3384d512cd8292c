mod config;
mod error;
mod extractor;
mod gateway;
mod messages;
mod models;
mod notify;
mod scheduler;
mod services;
mod store;
#[cfg(test)]
mod testing;
mod tracker;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use config::Config;
use error::{AppError, Result};
use extractor::HttpExtractor;
use gateway::Gateway;
use models::UserId;
use notify::{LogNotifier, Notifier};
use scheduler::Scheduler;
use services::TelegramClient;
use tracker::{SweepReport, Tracker, TrackerSettings};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = Config::load()?;

    let store_path = config.store_path();
    let store = store::open(config.store_backend, &store_path).await?;
    tracing::info!("Using {:?} store at {}", config.store_backend, store_path.display());

    let extractor = Arc::new(HttpExtractor::new(config.fetch_timeout())?);
    let telegram = match config.telegram_token.as_deref() {
        Some(token) => Some(Arc::new(TelegramClient::new(token)?)),
        None => None,
    };
    let notifier: Arc<dyn Notifier> = match &telegram {
        Some(client) => client.clone(),
        None => Arc::new(LogNotifier),
    };

    let tracker = Arc::new(Tracker::new(
        store,
        extractor,
        notifier.clone(),
        TrackerSettings::from(&config),
    ));

    // --list <chat id>: print a user's tracked products and exit
    if args.len() >= 3 && args[1] == "--list" {
        let items = tracker
            .list_products(&UserId::new(args[2].as_str()))
            .await
            .map_err(|e| AppError::Other(e.into()))?;
        println!("{}", messages::product_list(&items, items.len()));
        return Ok(());
    }

    let scheduler = Scheduler::new(tracker.clone(), config.check_interval())
        .check_on_start(config.check_on_startup);

    // --check-once: run a single sweep and exit
    if args.len() >= 2 && args[1] == "--check-once" {
        if telegram.is_none() {
            tracing::warn!("No telegram_token configured; price drop alerts will only be logged");
        }
        match scheduler.tick().await {
            Some(report) => println!("{}", check_once_summary(&report, telegram.is_some())),
            None => println!("Price check failed, see log for details"),
        }
        return Ok(());
    }

    let Some(telegram) = telegram else {
        return Err(AppError::Config(format!(
            "telegram_token is not set; add it to {} or export TELEGRAM_TOKEN",
            Config::config_path().display()
        )));
    };

    let cancel = install_signal_handler();
    let checker = tokio::spawn(scheduler.run(cancel.clone()));

    let gateway = Arc::new(Gateway::new(tracker, notifier, &config));
    tracing::info!("Bot is running");
    gateway.run(telegram, cancel.clone()).await;

    cancel.cancel();
    if let Err(e) = checker.await {
        tracing::error!("Price checker task failed: {}", e);
    }

    Ok(())
}

/// Cancels the returned token on SIGINT or SIGTERM.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => tracing::info!("Received Ctrl+C, shutting down"),
                        _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
                    }
                }
                Err(e) => {
                    tracing::warn!("Could not install SIGTERM handler: {}", e);
                    let _ = tokio::signal::ctrl_c().await;
                    tracing::info!("Received Ctrl+C, shutting down");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Received Ctrl+C, shutting down");
        }

        trigger.cancel();
    });

    token
}

fn check_once_summary(report: &SweepReport, delivered: bool) -> String {
    let mut summary = format!(
        "Checked {} products: {} updated, {} failed, {} alerts",
        report.total, report.succeeded, report.failed, report.alerts
    );
    if report.alerts > 0 && !delivered {
        summary.push_str(&format!(
            "\nWARNING: {} price drop alert(s) were written to the log only and not delivered \
             (no telegram_token configured); the new prices are already saved",
            report.alerts
        ));
    }
    summary
}
