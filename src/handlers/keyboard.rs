//! Menu and keyboard builder
//!
//! Choice lists are laid out into rows from per-item hints. The same item
//! sequence always produces the same grid.

use serde::{Deserialize, Serialize};

use super::labels;

/// Items per row when an item does not say otherwise
pub const DEFAULT_ITEMS_PER_ROW: usize = 2;

/// One choice offered to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardItem {
    pub label: String,
    /// Text sent back when the item is chosen
    pub value: String,
    pub items_per_row: Option<usize>,
    pub new_row_before: bool,
    pub new_row_after: bool,
}

impl KeyboardItem {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            items_per_row: None,
            new_row_before: false,
            new_row_after: false,
        }
    }

    /// Item whose value is its label
    pub fn plain(label: impl Into<String>) -> Self {
        let label = label.into();
        Self::new(label.clone(), label)
    }

    pub fn per_row(mut self, items: usize) -> Self {
        self.items_per_row = Some(items);
        self
    }

    pub fn row_before(mut self) -> Self {
        self.new_row_before = true;
        self
    }

    pub fn row_after(mut self) -> Self {
        self.new_row_after = true;
        self
    }
}

/// A laid-out button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub value: String,
}

/// Where the keyboard is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyboardKind {
    /// Buttons under the message, answered by callback
    Inline,
    /// Persistent reply keyboard replacing the text input
    Reply,
}

/// Rows of buttons ready for the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub kind: KeyboardKind,
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn inline(items: &[KeyboardItem]) -> Self {
        Self {
            kind: KeyboardKind::Inline,
            rows: layout_rows(items),
        }
    }

    pub fn reply(items: &[KeyboardItem]) -> Self {
        Self {
            kind: KeyboardKind::Reply,
            rows: layout_rows(items),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(Vec::is_empty)
    }

    /// All buttons in reading order
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }

    /// Whether some button sends `value`
    pub fn offers(&self, value: &str) -> bool {
        self.buttons().any(|button| button.value == value)
    }
}

/// Wrap items into rows.
///
/// A row closes when an item asks for a break after itself, when the row
/// holds a multiple of the current item's `items_per_row`, or at the last
/// item. `new_row_before` closes a non-empty row first.
pub fn layout_rows(items: &[KeyboardItem]) -> Vec<Vec<Button>> {
    let mut rows = Vec::new();
    let mut row: Vec<Button> = Vec::new();
    let last = items.len().saturating_sub(1);

    for (index, item) in items.iter().enumerate() {
        if item.new_row_before && !row.is_empty() {
            rows.push(std::mem::take(&mut row));
        }

        row.push(Button {
            label: item.label.clone(),
            value: item.value.clone(),
        });

        let per_row = item.items_per_row.unwrap_or(DEFAULT_ITEMS_PER_ROW).max(1);
        if item.new_row_after || row.len() % per_row == 0 || index == last {
            rows.push(std::mem::take(&mut row));
        }
    }

    rows
}

/// "Previous Step" and "Next Step" controls for a wizard prompt.
///
/// Previous is offered when an earlier answered step can be undone, wherever
/// the current step sits in the schema; Next when the step may be left empty
/// or collects several values.
pub fn step_controls(can_go_back: bool, skippable: bool) -> Vec<KeyboardItem> {
    let mut controls = Vec::new();

    if can_go_back {
        controls.push(KeyboardItem::plain(labels::PREVIOUS_STEP).per_row(2).row_before());
    }

    if skippable {
        let mut next = KeyboardItem::plain(labels::NEXT_STEP).per_row(2).row_after();
        if !can_go_back {
            next = next.row_before();
        }
        controls.push(next);
    }

    controls
}

/// Paging and "Change Criteria" controls shown under a result
pub fn result_controls(offset: u32, result_seen: bool, paged: bool) -> Vec<KeyboardItem> {
    let mut controls = Vec::new();

    if paged && offset > 0 {
        controls.push(KeyboardItem::plain(labels::PREVIOUS_RESULTS));
    }
    if paged && result_seen {
        controls.push(KeyboardItem::plain(labels::NEXT_RESULTS));
    }
    controls.push(KeyboardItem::plain(labels::CHANGE_CRITERIA).per_row(1).row_before());

    controls
}
