//! Chat front end: turns inbound messages into tracker calls and replies.

mod command;

use std::sync::Arc;

use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::TrackError;
use crate::messages;
use crate::models::UserId;
use crate::notify::Notifier;
use crate::services::TelegramClient;
use crate::tracker::{AddOutcome, Tracker};

pub use command::Command;

pub struct Gateway {
    tracker: Arc<Tracker>,
    notifier: Arc<dyn Notifier>,
    allowed_hosts: Vec<String>,
    list_limit: usize,
}

impl Gateway {
    pub fn new(tracker: Arc<Tracker>, notifier: Arc<dyn Notifier>, config: &Config) -> Self {
        Self {
            tracker,
            notifier,
            allowed_hosts: config.allowed_hosts.clone(),
            list_limit: config.list_limit,
        }
    }

    pub async fn handle_message(&self, user_id: &UserId, text: &str) {
        tracing::debug!("Received message from {}: {}", user_id, text);

        match Command::parse(text, &self.allowed_hosts) {
            Command::Help => self.reply(user_id, &messages::help()).await,
            Command::List => self.show_tracked_products(user_id).await,
            Command::Track(url) => self.track(user_id, &url).await,
            Command::Unknown => {
                self.reply(user_id, &messages::usage_hint(&self.allowed_hosts))
                    .await
            }
        }
    }

    async fn track(&self, user_id: &UserId, url: &str) {
        self.reply(user_id, &messages::fetching()).await;

        let reply = match self.tracker.add_product(user_id, url).await {
            Ok(AddOutcome::Added(item)) => messages::added(&item),
            Ok(AddOutcome::AlreadyTracked { current_price, .. }) => {
                messages::already_tracked(current_price)
            }
            Err(TrackError::ExtractionFailed { .. }) => messages::extraction_failed(),
            Err(TrackError::InvalidProduct(_)) => messages::invalid_product(),
            Err(TrackError::StoreUnavailable(_)) => messages::store_failed(),
        };
        self.reply(user_id, &reply).await;
    }

    async fn show_tracked_products(&self, user_id: &UserId) {
        let reply = match self.tracker.list_products(user_id).await {
            Ok(items) => messages::product_list(&items, self.list_limit),
            Err(e) => {
                tracing::error!("Failed to list products for {}: {}", user_id, e);
                messages::store_failed()
            }
        };
        self.reply(user_id, &reply).await;
    }

    async fn reply(&self, user_id: &UserId, text: &str) {
        self.notifier.notify(user_id, text).await;
    }

    /// Dispatches Telegram messages to [`Gateway::handle_message`] until
    /// `cancel` fires.
    pub async fn run(self: Arc<Self>, telegram: Arc<TelegramClient>, cancel: CancellationToken) {
        let handler = Update::filter_message().endpoint(move |msg: Message| {
            let gateway = Arc::clone(&self);
            async move {
                match msg.text() {
                    Some(text) => {
                        gateway
                            .handle_message(&UserId::from(msg.chat.id.0), text)
                            .await;
                    }
                    None => tracing::debug!(chat_id = msg.chat.id.0, "Ignoring non-text message"),
                }
                respond(())
            }
        });

        let mut dispatcher = Dispatcher::builder(telegram.bot().clone(), handler)
            .default_handler(|_| async {})
            .build();

        tracing::info!("Polling for messages");
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = dispatcher.dispatch() => {}
        }
        tracing::info!("Stopped polling for messages");
    }
}
