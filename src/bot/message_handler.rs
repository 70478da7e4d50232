//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use teloxide::utils::command::BotCommands;
use tracing::{debug, warn};

// Import localization
use crate::localization::t_lang;

use crate::rate_limit::RateLimiter;

use super::commands::Command;
use super::dialogue_manager::{Event, FlowController, Inbound, Outbox, Reply};

/// Telegram rejects text messages longer than this
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Sends controller replies to one chat
pub struct TelegramOutbox {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramOutbox {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl Outbox for TelegramOutbox {
    async fn deliver(&self, reply: Reply) -> Result<()> {
        match reply {
            Reply::Text(text) => {
                for chunk in split_message(&text, MAX_MESSAGE_CHARS) {
                    self.bot.send_message(self.chat_id, chunk).await?;
                }
            }
            Reply::Document {
                file_name,
                bytes,
                caption,
            } => {
                debug!(chat_id = %self.chat_id, file_name = %file_name, bytes = bytes.len(), "Sending document");
                self.bot
                    .send_document(self.chat_id, InputFile::memory(bytes).file_name(file_name))
                    .caption(caption)
                    .await?;
            }
        }
        Ok(())
    }
}

/// Split `text` on line boundaries into chunks of at most `max_chars` characters
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let mut line = line.to_string();
        // A single line longer than the limit is cut hard
        while line.chars().count() > max_chars {
            let head: String = line.chars().take(max_chars).collect();
            line = line.chars().skip(max_chars).collect();
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            chunks.push(head);
        }

        let line_len = line.chars().count();
        let needed = if current.is_empty() { line_len } else { current_len + 1 + line_len };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(&line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Classify message text as a known command, an unknown command or plain text
pub fn classify_text(text: &str, bot_username: &str) -> Inbound {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return Inbound::Text(text.to_string());
    }
    match Command::parse(trimmed, bot_username) {
        Ok(command) => Inbound::Command(command),
        Err(_) => Inbound::UnknownCommand(trimmed.to_string()),
    }
}

/// Build a controller event from a text message
pub fn event_from_message(msg: &Message, bot_username: &str) -> Option<Event> {
    let text = msg.text()?;
    let user = msg.from.as_ref();

    Some(Event {
        owner: user.map(|u| u.id.0 as i64).unwrap_or(msg.chat.id.0),
        first_name: user.map(|u| u.first_name.clone()),
        display_name: user.map(|u| u.full_name()),
        language_code: user.and_then(|u| u.language_code.clone()),
        input: classify_text(text, bot_username),
    })
}

async fn handle_unsupported_message(bot: &Bot, msg: &Message) -> Result<()> {
    // Extract user's language code from Telegram
    let language_code = msg
        .from
        .as_ref()
        .and_then(|user| user.language_code.as_ref())
        .map(|s| s.as_str());

    debug!(user_id = %msg.chat.id, "Received unsupported message type from user");

    bot.send_message(msg.chat.id, t_lang("error-unsupported-message", language_code))
        .await?;
    Ok(())
}

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    controller: Arc<FlowController>,
    limiter: Arc<RateLimiter>,
    bot_username: Arc<String>,
) -> Result<()> {
    let Some(event) = event_from_message(&msg, &bot_username) else {
        return handle_unsupported_message(&bot, &msg).await;
    };

    if !limiter.check(event.owner) {
        warn!(user_id = event.owner, "Rate limit exceeded");
        bot.send_message(
            msg.chat.id,
            t_lang("error-rate-limited", event.language_code.as_deref()),
        )
        .await?;
        return Ok(());
    }

    let outbox = TelegramOutbox::new(bot, msg.chat.id);
    controller.handle(event, &outbox).await;
    Ok(())
}

/// Register the command menu shown by Telegram clients
pub async fn register_commands(bot: &Bot) -> Result<()> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}
