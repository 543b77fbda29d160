//! Chat access policy
//!
//! Decides which chats the bridge answers, which user identity a chat acts
//! as, and which tool categories and query credentials it gets.

use tracing::debug;

use crate::config::{AccessConfig, AllowedChat};
use crate::tools::ToolKind;

/// Access decisions for a chat
pub trait AccessPolicy: Send + Sync {
    /// Whether the chat may use the bridge at all
    fn is_allowed(&self, chat_id: i64) -> bool;

    /// User identity the chat acts as
    fn user_binding(&self, chat_id: i64) -> Option<String>;

    /// Whether the chat may open the tools menu
    fn can_access_tools(&self, chat_id: i64) -> bool;

    fn can_access_tool(&self, chat_id: i64, kind: ToolKind) -> bool;

    /// Credential used for the chat's queries
    fn query_token(&self, chat_id: i64) -> Option<String>;

    /// Whether the chat may open the queries menu; needs a query token
    fn can_access_queries(&self, chat_id: i64) -> bool {
        self.is_allowed(chat_id) && self.query_token(chat_id).is_some()
    }
}

/// Policy read from the `access` configuration section
#[derive(Debug, Clone)]
pub struct ChatAccess {
    config: AccessConfig,
}

impl ChatAccess {
    pub fn new(config: AccessConfig) -> Self {
        Self { config }
    }

    fn chat(&self, chat_id: i64) -> Option<&AllowedChat> {
        self.config.chats.iter().find(|chat| chat.chat_id == chat_id)
    }
}

impl AccessPolicy for ChatAccess {
    fn is_allowed(&self, chat_id: i64) -> bool {
        let allowed = self.config.allow_other_chats || self.chat(chat_id).is_some();
        if !allowed {
            debug!(chat_id, "Chat is not in the access list");
        }
        allowed
    }

    fn user_binding(&self, chat_id: i64) -> Option<String> {
        self.chat(chat_id).and_then(|chat| chat.user.clone())
    }

    fn can_access_tools(&self, chat_id: i64) -> bool {
        self.chat(chat_id)
            .map_or(false, |chat| chat.user.is_some() && !chat.tools.is_empty())
    }

    fn can_access_tool(&self, chat_id: i64, kind: ToolKind) -> bool {
        self.chat(chat_id).map_or(false, |chat| {
            chat.user.is_some() && chat.tools.iter().any(|tool| tool == kind.handle())
        })
    }

    fn query_token(&self, chat_id: i64) -> Option<String> {
        match self.chat(chat_id) {
            Some(chat) => chat.query_token.clone(),
            None if self.config.allow_other_chats => self.config.other_chats_query_token.clone(),
            None => None,
        }
    }
}
