//! Built-in tools
//!
//! Tools are grouped into categories. Each category is one [`ToolKind`] and
//! is served by a [`ToolType`] implementation registered in the
//! [`ToolRegistry`].

pub mod commerce;
pub mod content;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::handlers::keyboard::KeyboardItem;
use crate::models::RenderedResult;
use crate::state::{Session, StepSchema};
use crate::utils::errors::{BridgeError, Result};

pub use commerce::{CommerceBackend, CommerceTool};
pub use content::{ContentBackend, ContentTool};

/// Choices offered for `limit` steps
pub const LIMIT_CHOICES: [u32; 6] = [1, 2, 5, 10, 15, 20];

/// Labels longer than this get a keyboard row of their own
pub const LONG_LABEL: usize = 20;

/// Tool categories known to the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    Content,
    Commerce,
}

impl ToolKind {
    pub const ALL: [ToolKind; 2] = [ToolKind::Content, ToolKind::Commerce];

    /// Stable identifier used in callbacks and configuration
    pub fn handle(&self) -> &'static str {
        match self {
            ToolKind::Content => "craft",
            ToolKind::Commerce => "commerce",
        }
    }

    pub fn from_handle(handle: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.handle() == handle)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.handle())
    }
}

/// One tool of a category, as shown in the tool list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolEntry {
    /// Value sent back when chosen
    pub key: String,
    pub label: String,
}

impl ToolEntry {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

/// Capabilities every tool category provides
#[async_trait]
pub trait ToolType: Send + Sync {
    fn kind(&self) -> ToolKind;

    fn display_name(&self) -> String;

    /// Tools in display order
    fn tools(&self) -> Vec<ToolEntry>;

    /// Wizard steps for `tool`
    async fn criteria(&self, tool: &str, session: &Session) -> Result<StepSchema>;

    /// Choices for a step of the active tool
    async fn keyboard_items(&self, step: &str, session: &Session) -> Result<Vec<KeyboardItem>>;

    /// Run `tool` with the answers in `session`
    async fn render(&self, tool: &str, session: &Session) -> Result<RenderedResult>;
}

/// Explicit table of available tool categories, in menu order.
///
/// Backends live outside this crate: an embedding application wraps its
/// [`CommerceBackend`] or [`ContentBackend`] in [`CommerceTool`] or
/// [`ContentTool`] and registers it here. An empty registry hides the Tools
/// menu.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    entries: Vec<Arc<dyn ToolType>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a category; a later registration of the same kind replaces it
    pub fn register(&mut self, tool: Arc<dyn ToolType>) {
        let kind = tool.kind();
        self.entries.retain(|existing| existing.kind() != kind);
        self.entries.push(tool);
    }

    pub fn with(mut self, tool: Arc<dyn ToolType>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, kind: ToolKind) -> Option<&Arc<dyn ToolType>> {
        self.entries.iter().find(|tool| tool.kind() == kind)
    }

    /// Look a category up, failing for unregistered kinds
    pub fn require(&self, kind: ToolKind) -> Result<&Arc<dyn ToolType>> {
        self.get(kind)
            .ok_or_else(|| BridgeError::UnknownTool(kind.handle().to_string()))
    }

    pub fn kinds(&self) -> impl Iterator<Item = ToolKind> + '_ {
        self.entries.iter().map(|tool| tool.kind())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.kinds()).finish()
    }
}

/// Keyboard items for `limit` steps
pub fn limit_items() -> Vec<KeyboardItem> {
    LIMIT_CHOICES
        .iter()
        .map(|limit| KeyboardItem::plain(limit.to_string()).per_row(3))
        .collect()
}

/// Keyboard item for a tool or query entry; long labels take a whole row
pub fn entry_item(label: &str, value: &str) -> KeyboardItem {
    let item = KeyboardItem::new(label, value);
    if label.chars().count() > LONG_LABEL {
        item.per_row(1).row_before().row_after()
    } else {
        item
    }
}

/// Validator message for a value outside a fixed list
pub(crate) fn not_valid(item: &str) -> String {
    format!("The {} is not valid.", item)
}

/// Validate a value against a fixed list of choices
pub(crate) fn one_of(value: &str, choices: &[&str]) -> crate::state::Validation {
    if choices.contains(&value) {
        Ok(())
    } else {
        Err(not_valid(value))
    }
}
