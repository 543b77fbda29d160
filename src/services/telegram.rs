//! Outbound transport
//!
//! The dispatcher talks to chats through the [`Transport`] trait. The
//! Telegram implementation sends HTML formatted messages and maps keyboards
//! onto inline or reply markups.

use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::payloads::{SendMessageSetters, SendPhotoSetters};
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, KeyboardButton, KeyboardMarkup, ParseMode,
    ReplyMarkup,
};
use tracing::{debug, warn};

use crate::handlers::keyboard::{Keyboard, KeyboardKind};
use crate::models::{ChartImage, FileRef};
use crate::utils::errors::{BridgeError, Result};
use crate::utils::helpers::{data_uri, mime_from_path};

/// Outbound side of the bridge
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> Result<()>;

    async fn send_photo(&self, chat_id: i64, image: &ChartImage, keyboard: Option<&Keyboard>) -> Result<()>;

    /// Stop the client's loading indicator for a button press
    async fn acknowledge_callback(&self, callback_id: &str) -> Result<()>;

    /// Fetch an uploaded file as a `data:` URI
    async fn download_file(&self, file: &FileRef) -> Result<String>;
}

/// Transport backed by the Telegram Bot API
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

/// Convert a laid-out keyboard into Telegram markup
pub fn reply_markup(keyboard: &Keyboard) -> ReplyMarkup {
    match keyboard.kind {
        KeyboardKind::Inline => {
            let rows = keyboard.rows.iter().map(|row| {
                row.iter()
                    .map(|button| InlineKeyboardButton::callback(button.label.clone(), button.value.clone()))
                    .collect::<Vec<_>>()
            });
            ReplyMarkup::InlineKeyboard(InlineKeyboardMarkup::new(rows))
        }
        KeyboardKind::Reply => {
            let rows = keyboard.rows.iter().map(|row| {
                row.iter()
                    .map(|button| KeyboardButton::new(button.label.clone()))
                    .collect::<Vec<_>>()
            });
            ReplyMarkup::Keyboard(KeyboardMarkup::new(rows).resize_keyboard())
        }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_message(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> Result<()> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(reply_markup(keyboard));
        }
        request.await?;
        debug!(chat_id, "Message sent");
        Ok(())
    }

    async fn send_photo(&self, chat_id: i64, image: &ChartImage, keyboard: Option<&Keyboard>) -> Result<()> {
        let photo = InputFile::memory(image.bytes.clone()).file_name(image.file_name.clone());
        let mut request = self.bot.send_photo(ChatId(chat_id), photo);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(reply_markup(keyboard));
        }
        request.await?;
        debug!(chat_id, file_name = %image.file_name, "Photo sent");
        Ok(())
    }

    async fn acknowledge_callback(&self, callback_id: &str) -> Result<()> {
        if let Err(e) = self.bot.answer_callback_query(callback_id.to_string()).await {
            warn!(error = %e, "Failed to answer callback query");
            return Err(e.into());
        }
        Ok(())
    }

    async fn download_file(&self, file: &FileRef) -> Result<String> {
        let meta = self.bot.get_file(file.file_id.clone()).await?;
        let mut bytes: Vec<u8> = Vec::new();
        self.bot.download_file(&meta.path, &mut bytes).await?;
        if bytes.is_empty() {
            return Err(BridgeError::InvalidInput(format!("uploaded file {} is empty", file.file_id)));
        }
        debug!(file_id = %file.file_id, size = bytes.len(), "File downloaded");
        Ok(data_uri(mime_from_path(&meta.path), &bytes))
    }
}
