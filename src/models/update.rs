//! Normalized inbound update

use serde::{Deserialize, Serialize};

/// Kind of file the user uploaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Photo,
    Document,
    Voice,
    Audio,
    Video,
}

/// Transport reference to an uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub file_id: String,
    pub kind: FileKind,
}

/// One update as the dispatcher sees it, independent of the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundUpdate {
    /// Transport sequence number, when the transport has one
    pub update_id: Option<u32>,
    pub chat_id: i64,
    pub text: String,
    pub callback_id: Option<String>,
    pub file: Option<FileRef>,
}

impl InboundUpdate {
    /// A plain text message
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            update_id: None,
            chat_id,
            text: text.into(),
            callback_id: None,
            file: None,
        }
    }

    /// A button press carrying `data`
    pub fn callback(chat_id: i64, data: impl Into<String>, callback_id: impl Into<String>) -> Self {
        Self {
            update_id: None,
            chat_id,
            text: data.into(),
            callback_id: Some(callback_id.into()),
            file: None,
        }
    }

    /// An uploaded file
    pub fn file(chat_id: i64, file: FileRef) -> Self {
        Self {
            update_id: None,
            chat_id,
            text: String::new(),
            callback_id: None,
            file: Some(file),
        }
    }

    pub fn with_update_id(mut self, update_id: u32) -> Self {
        self.update_id = Some(update_id);
        self
    }

    pub fn is_callback(&self) -> bool {
        self.callback_id.is_some()
    }
}
