//! Telegram bot client - simple polling version.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{BotCommand as MenuCommand, ChatAction, MessageOrigin};
use teloxide::RequestError;

use crate::ai::render;
use crate::ai::{ChatReply, Language, Msg, ResourceSender, TurnContext};
use crate::app::App;
use crate::error::Error;
use crate::storage::{truncate_chars, Archive};

use super::commands::{parse_command, run_command, CommandReply, MENU};
use super::ingest::{classify, Attachment, Incoming, IncomingMessage, IngestRules};
use super::sender::TelegramResourceSender;

const MAX_MESSAGE_CHARS: usize = 4000;
const EBOOK_EXTENSIONS: &[&str] = &["epub", "mobi", "azw3", "fb2"];
const PENDING_SWEEP_SECS: u64 = 60;

/// Run the telegram bot daemon using simple polling.
pub async fn run_telegram_daemon(app: Arc<App>) -> Result<(), Error> {
    tracing::info!("Starting Telegram bot...");

    let token = app
        .settings
        .read()
        .ok()
        .and_then(|s| s.telegram.bot_token.clone())
        .ok_or_else(|| Error::Telegram("No bot token configured".to_string()))?;

    let bot = Bot::new(token);

    let menu = MENU
        .iter()
        .map(|(name, description)| MenuCommand::new(*name, *description))
        .collect::<Vec<_>>();
    if let Err(e) = bot.set_my_commands(menu).await {
        tracing::warn!("Failed to set commands: {}", e);
    }

    tracing::info!("Telegram bot commands set");

    let sweeper = app.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(PENDING_SWEEP_SECS)).await;
            let dropped = sweeper.pending.cleanup_expired();
            if dropped > 0 {
                tracing::debug!(dropped, "expired confirmations swept");
            }
        }
    });

    teloxide::repl(bot, move |bot: Bot, msg: Message| {
        let app = app.clone();
        async move { handle_message(bot, msg, app).await }
    })
    .await;

    Ok(())
}

fn is_owner(app: &App, user_id: u64) -> bool {
    match app.settings.read().ok().and_then(|s| s.telegram.owner_id) {
        Some(owner) => owner == user_id,
        None => true,
    }
}

fn ingest_rules(app: &App) -> IngestRules {
    match app.settings.read() {
        Ok(s) => IngestRules {
            chat_enabled: s.ai.chat_enabled,
            short_text_threshold: s.ai.short_text_threshold,
        },
        Err(_) => IngestRules {
            chat_enabled: false,
            short_text_threshold: 0,
        },
    }
}

fn storage_channel(app: &App) -> Option<i64> {
    app.settings
        .read()
        .ok()
        .and_then(|s| s.telegram.storage_channel_id)
}

/// Handle incoming messages.
async fn handle_message(bot: Bot, msg: Message, app: Arc<App>) -> Result<(), RequestError> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id.0;
    let lang = user
        .language_code
        .as_deref()
        .map(Language::from_code)
        .unwrap_or_else(|| app.language());
    if !is_owner(&app, user_id) {
        tracing::warn!(user_id, "message from non-owner ignored");
        bot.send_message(msg.chat.id, Msg::NotOwner.text(lang))
            .await?;
        return Ok(());
    }
    let user_id = user_id as i64;

    if let Some(cmd) = msg.text().and_then(parse_command) {
        let reply = run_command(&app, user_id, cmd, lang);
        return send_command_reply(&bot, &app, msg.chat.id, reply, lang).await;
    }

    let incoming = IncomingMessage {
        text: msg
            .text()
            .or_else(|| msg.caption())
            .unwrap_or("")
            .to_string(),
        attachment: attachment_of(&msg),
        forwarded_from: forwarded_from(&msg),
    };

    match classify(incoming, ingest_rules(&app)) {
        Incoming::Ignore => Ok(()),
        Incoming::Chat(text) => {
            let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;
            let sender: Arc<dyn ResourceSender> = Arc::new(TelegramResourceSender::new(bot.clone()));
            let ctx = TurnContext::new(user_id, msg.chat.id.0, lang).with_sender(sender);
            match app.router.handle(&text, &ctx).await {
                ChatReply::Text(reply) => send_text(&bot, msg.chat.id, &reply).await,
                ChatReply::ResourceSent => Ok(()),
            }
        }
        Incoming::Archive(mut archive) => {
            if archive.file_id.is_some() {
                if let Some(channel) = storage_channel(&app) {
                    match bot
                        .copy_message(ChatId(channel), msg.chat.id, msg.id)
                        .await
                    {
                        Ok(copied) => {
                            archive.storage_type = Some("telegram".to_string());
                            archive.storage_path = Some(format!("telegram:{}:{}", channel, copied.0));
                        }
                        Err(e) => {
                            tracing::warn!("Failed to copy media to storage channel: {}", e);
                        }
                    }
                }
            }

            match app.manager.create_archive(&archive) {
                Ok(id) => {
                    tracing::info!(archive_id = id, content_type = %archive.content_type, "archived");
                    let mut reply = format!("✅ Archived #{}", id);
                    if !archive.tags.is_empty() {
                        reply.push_str(&format!(
                            " ({})",
                            archive
                                .tags
                                .iter()
                                .map(|t| format!("#{}", t))
                                .collect::<Vec<_>>()
                                .join(" ")
                        ));
                    }
                    bot.send_message(msg.chat.id, reply).await?;
                }
                Err(e) => {
                    tracing::error!("Failed to archive message: {}", e);
                    bot.send_message(msg.chat.id, "Failed to archive message.")
                        .await?;
                }
            }
            Ok(())
        }
    }
}

async fn send_text(bot: &Bot, chat_id: ChatId, text: &str) -> Result<(), RequestError> {
    bot.send_message(chat_id, truncate_chars(text, MAX_MESSAGE_CHARS))
        .await?;
    Ok(())
}

async fn send_command_reply(
    bot: &Bot,
    app: &App,
    chat_id: ChatId,
    reply: CommandReply,
    lang: Language,
) -> Result<(), RequestError> {
    match reply {
        CommandReply::Text(text) => send_text(bot, chat_id, &text).await,
        CommandReply::Archive(archive) => send_archive(bot, app, chat_id, &archive, lang).await,
    }
}

async fn send_archive(
    bot: &Bot,
    app: &App,
    chat_id: ChatId,
    archive: &Archive,
    lang: Language,
) -> Result<(), RequestError> {
    if archive.is_media() && archive.telegram_location().is_some() {
        let sender = TelegramResourceSender::new(bot.clone());
        match sender
            .send_archive(chat_id.0, archive, &render::archive_caption(archive))
            .await
        {
            Ok(()) => return Ok(()),
            Err(e) => tracing::warn!(archive_id = archive.id, "media delivery failed: {}", e),
        }
    }
    let notes = app.store.notes_for_archive(archive.id).unwrap_or_default();
    send_text(bot, chat_id, &render::archive_detail(archive, &notes, lang)).await
}

fn extension(file_name: Option<&str>) -> Option<String> {
    let name = file_name?;
    std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

fn attachment_of(msg: &Message) -> Option<Attachment> {
    if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        return Some(Attachment {
            content_type: "photo",
            file_id: photo.file.id.to_string(),
            file_size: Some(photo.file.size as i64),
            file_name: None,
        });
    }
    if let Some(video) = msg.video() {
        return Some(Attachment {
            content_type: "video",
            file_id: video.file.id.to_string(),
            file_size: Some(video.file.size as i64),
            file_name: video.file_name.clone(),
        });
    }
    if let Some(audio) = msg.audio() {
        return Some(Attachment {
            content_type: "audio",
            file_id: audio.file.id.to_string(),
            file_size: Some(audio.file.size as i64),
            file_name: audio.file_name.clone(),
        });
    }
    if let Some(voice) = msg.voice() {
        return Some(Attachment {
            content_type: "voice",
            file_id: voice.file.id.to_string(),
            file_size: Some(voice.file.size as i64),
            file_name: None,
        });
    }
    if let Some(doc) = msg.document() {
        let is_ebook = extension(doc.file_name.as_deref())
            .is_some_and(|ext| EBOOK_EXTENSIONS.contains(&ext.as_str()));
        return Some(Attachment {
            content_type: if is_ebook { "ebook" } else { "document" },
            file_id: doc.file.id.to_string(),
            file_size: Some(doc.file.size as i64),
            file_name: doc.file_name.clone(),
        });
    }
    None
}

fn forwarded_from(msg: &Message) -> Option<String> {
    msg.forward_origin().map(|origin| match origin {
        MessageOrigin::User { sender_user, .. } => sender_user.full_name(),
        MessageOrigin::HiddenUser {
            sender_user_name, ..
        } => sender_user_name.clone(),
        MessageOrigin::Chat { sender_chat, .. } => {
            sender_chat.title().unwrap_or("chat").to_string()
        }
        MessageOrigin::Channel { chat, .. } => chat.title().unwrap_or("channel").to_string(),
    })
}
