//! Delivers stored media archives by copying them out of the storage channel.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::MessageId;

use crate::ai::ResourceSender;
use crate::error::{Error, Result};
use crate::storage::Archive;

pub struct TelegramResourceSender {
    bot: Bot,
}

impl TelegramResourceSender {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ResourceSender for TelegramResourceSender {
    async fn send_archive(&self, chat_id: i64, archive: &Archive, caption: &str) -> Result<()> {
        let (channel_id, message_id) = archive.telegram_location().ok_or_else(|| {
            Error::NotFound(format!("archive #{} is not stored in Telegram", archive.id))
        })?;

        self.bot
            .copy_message(ChatId(chat_id), ChatId(channel_id), MessageId(message_id))
            .caption(caption.to_string())
            .await
            .map_err(|e| Error::Telegram(e.to_string()))?;
        Ok(())
    }
}
