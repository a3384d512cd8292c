use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};

use crate::error::{AppError, Result};
use crate::models::UserId;
use crate::notify::Notifier;

/// Telegram Bot API access for outbound messages and the inbound dispatcher.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::Config("Telegram token is empty".to_string()));
        }

        Ok(Self {
            bot: Bot::new(token),
        })
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub async fn send_message(&self, chat_id: ChatId, text: &str, markdown: bool) -> Result<()> {
        let request = self.bot.send_message(chat_id, text);
        if markdown {
            // Message templates use the legacy `*bold*` / `` `code` `` syntax.
            #[allow(deprecated)]
            request.parse_mode(ParseMode::Markdown).await?;
        } else {
            request.await?;
        }
        Ok(())
    }
}

/// Chat ids are stored as decimal strings; group chats are negative.
pub fn chat_id(user_id: &UserId) -> Option<ChatId> {
    user_id.as_str().trim().parse::<i64>().ok().map(ChatId)
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn notify(&self, user_id: &UserId, text: &str) {
        let Some(chat_id) = chat_id(user_id) else {
            tracing::error!("Cannot message {}: not a Telegram chat id", user_id);
            return;
        };

        let Err(e) = self.send_message(chat_id, text, true).await else {
            return;
        };

        // Product titles can contain characters Telegram's Markdown parser rejects.
        tracing::warn!("Failed to send message to {}: {}; retrying as plain text", user_id, e);
        if let Err(e) = self.send_message(chat_id, text, false).await {
            tracing::error!("Failed to send plain message to {}: {}", user_id, e);
        }
    }
}
