//! Per-chat session state
//!
//! One [`Session`] holds everything the bot remembers about a chat: which menu
//! is open, what was selected there, the answers collected by the criteria
//! wizard and where the wizard cursor stands.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::schema::StepValue;

/// Top-level menu currently open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Menu {
    #[default]
    None,
    Tools,
    Queries,
}

impl Menu {
    pub fn as_str(&self) -> &'static str {
        match self {
            Menu::None => "none",
            Menu::Tools => "tools",
            Menu::Queries => "queries",
        }
    }
}

/// What the last reply asked the chat for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Expecting {
    /// Home menu was shown
    #[default]
    Home,
    /// Tool category picker was shown
    ToolCategory,
    /// Tool list or a tool result was shown
    Tool,
    /// Query picker or a query result was shown
    Query,
    /// A wizard step prompt was shown
    Criteria,
}

impl Expecting {
    pub fn as_str(&self) -> &'static str {
        match self {
            Expecting::Home => "home",
            Expecting::ToolCategory => "tool_category",
            Expecting::Tool => "tool",
            Expecting::Query => "query",
            Expecting::Criteria => "criteria",
        }
    }
}

/// Conversation state of one chat
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub chat_id: i64,
    pub menu: Menu,
    pub expecting: Expecting,
    /// Handle of the selected tool category
    pub tool_category: Option<String>,
    pub tool: Option<String>,
    pub query_id: Option<String>,
    /// Query folder being browsed
    pub descendant_of: Option<String>,
    /// Answers given by the user
    pub step_values: BTreeMap<String, StepValue>,
    /// Answers filled in for structurally skipped steps
    pub prefilled: BTreeMap<String, StepValue>,
    /// Nullable steps the user moved past without answering
    pub passed_steps: BTreeSet<String>,
    /// Choices collected so far for the multi-select step under the cursor
    pub pending_selection: Vec<String>,
    pub criteria_step: Option<String>,
    pub previous_criteria_step: Option<String>,
    pub offset: u32,
    pub page_limit: Option<u32>,
    pub result_seen: bool,
    pub pending_callback_id: Option<String>,
    /// User identity the chat was bound to when the session started
    pub bound_user: Option<String>,
    pub config_fingerprint: Option<u64>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a fresh session for a chat
    pub fn new(chat_id: i64) -> Self {
        Self {
            chat_id,
            menu: Menu::None,
            expecting: Expecting::Home,
            tool_category: None,
            tool: None,
            query_id: None,
            descendant_of: None,
            step_values: BTreeMap::new(),
            prefilled: BTreeMap::new(),
            passed_steps: BTreeSet::new(),
            pending_selection: Vec::new(),
            criteria_step: None,
            previous_criteria_step: None,
            offset: 0,
            page_limit: None,
            result_seen: false,
            pending_callback_id: None,
            bound_user: None,
            config_fingerprint: None,
            updated_at: Utc::now(),
        }
    }

    /// Value recorded for a step, answered or auto-filled
    pub fn value(&self, step: &str) -> Option<&StepValue> {
        self.step_values.get(step).or_else(|| self.prefilled.get(step))
    }

    /// Text value of a step, if it holds one
    pub fn text(&self, step: &str) -> Option<&str> {
        self.value(step).and_then(StepValue::as_text)
    }

    /// Whether the wizard considers a step answered.
    ///
    /// Presence decides, not truthiness: `"0"` and `Null` both count.
    pub fn is_satisfied(&self, step: &str) -> bool {
        self.step_values.contains_key(step)
            || self.prefilled.contains_key(step)
            || self.passed_steps.contains(step)
    }

    /// Values the user actually supplied
    pub fn captured(&self) -> &BTreeMap<String, StepValue> {
        &self.step_values
    }

    pub fn commit(&mut self, step: &str, value: StepValue) {
        self.passed_steps.remove(step);
        self.step_values.insert(step.to_string(), value);
        self.touch();
    }

    pub fn pass(&mut self, step: &str) {
        self.step_values.remove(step);
        self.passed_steps.insert(step.to_string());
        self.touch();
    }

    pub fn prefill(&mut self, step: &str, value: StepValue) {
        self.prefilled.insert(step.to_string(), value);
    }

    /// Forget any answer for a step
    pub fn clear_step(&mut self, step: &str) {
        self.step_values.remove(step);
        self.prefilled.remove(step);
        self.passed_steps.remove(step);
        self.touch();
    }

    /// Drop all wizard answers and cursor state, keeping the selection
    pub fn clear_criteria(&mut self) {
        self.step_values.clear();
        self.prefilled.clear();
        self.passed_steps.clear();
        self.pending_selection.clear();
        self.criteria_step = None;
        self.previous_criteria_step = None;
        self.offset = 0;
        self.page_limit = None;
        self.result_seen = false;
        self.touch();
    }

    /// Open a top-level menu, discarding everything the previous one collected
    pub fn open_menu(&mut self, menu: Menu) {
        self.clear_criteria();
        self.tool_category = None;
        self.tool = None;
        self.query_id = None;
        self.descendant_of = None;
        self.menu = menu;
    }

    /// The wizard is waiting on a step
    pub fn wizard_active(&self) -> bool {
        self.criteria_step.is_some()
    }

    /// Page size for paged results; zero or unset falls back to ten
    pub fn effective_limit(&self) -> u32 {
        match self.page_limit {
            Some(limit) if limit > 0 => limit,
            _ => 10,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Short description for logs
    pub fn summary(&self) -> String {
        format!(
            "Chat {}: menu={}, expecting={}, step={:?}, answers={}",
            self.chat_id,
            self.menu.as_str(),
            self.expecting.as_str(),
            self.criteria_step,
            self.step_values.len()
        )
    }
}
