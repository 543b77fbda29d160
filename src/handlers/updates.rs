//! Telegram update intake
//!
//! Converts Telegram updates into [`InboundUpdate`]s and feeds them to the
//! [`Dispatcher`]. Only private chats are served.

use std::sync::Arc;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{Message, UpdateKind};
use tracing::debug;

use super::dispatcher::Dispatcher;
use crate::models::{FileKind, FileRef, InboundUpdate};
use crate::utils::errors::BridgeError;

fn uploaded_file(msg: &Message) -> Option<FileRef> {
    let (file_id, kind) = if let Some(sizes) = msg.photo() {
        // Sizes are ordered smallest first
        (sizes.last()?.file.id.to_string(), FileKind::Photo)
    } else if let Some(document) = msg.document() {
        (document.file.id.to_string(), FileKind::Document)
    } else if let Some(voice) = msg.voice() {
        (voice.file.id.to_string(), FileKind::Voice)
    } else if let Some(audio) = msg.audio() {
        (audio.file.id.to_string(), FileKind::Audio)
    } else if let Some(video) = msg.video() {
        (video.file.id.to_string(), FileKind::Video)
    } else {
        return None;
    };
    Some(FileRef { file_id, kind })
}

/// Normalize a Telegram update; `None` for anything the bridge ignores
pub fn normalize(update: &Update) -> Option<InboundUpdate> {
    let update_id = update.id.0;

    match &update.kind {
        UpdateKind::Message(msg) => {
            if !msg.chat.is_private() {
                return None;
            }
            let file = uploaded_file(msg);
            let text = msg.text().or_else(|| msg.caption()).unwrap_or_default().to_string();
            if text.is_empty() && file.is_none() {
                return None;
            }
            Some(InboundUpdate {
                update_id: Some(update_id),
                chat_id: msg.chat.id.0,
                text,
                callback_id: None,
                file,
            })
        }
        UpdateKind::CallbackQuery(query) => {
            let chat_id = match query.message.as_ref() {
                Some(message) if !message.chat().is_private() => return None,
                Some(message) => message.chat().id.0,
                // Private chat ids equal the user id
                None => query.from.id.0 as i64,
            };
            Some(InboundUpdate {
                update_id: Some(update_id),
                chat_id,
                text: query.data.clone().unwrap_or_default(),
                callback_id: Some(query.id.to_string()),
                file: None,
            })
        }
        _ => None,
    }
}

async fn handle_update(update: Update, dispatcher: Arc<Dispatcher>) -> Result<(), BridgeError> {
    match normalize(&update) {
        Some(inbound) => {
            dispatcher.handle(inbound).await?;
        }
        None => debug!(update_id = update.id.0, "Ignoring update"),
    }
    Ok(())
}

/// Handler tree for teloxide's dispatcher, used in webhook mode
pub fn update_handler() -> UpdateHandler<BridgeError> {
    dptree::endpoint(handle_update)
}
