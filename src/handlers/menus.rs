//! Picker menus: home, tool categories, tools and query folders

use super::keyboard::{result_controls, Keyboard, KeyboardItem};
use super::labels;
use crate::models::Reply;
use crate::queries::QueryNode;
use crate::tools::{entry_item, ToolType};

/// Home reply keyboard with the menus the chat may open
pub fn home(tools: bool, queries: bool) -> Reply {
    let mut items = Vec::new();
    if tools {
        items.push(KeyboardItem::plain(labels::TOOLS));
    }
    if queries {
        items.push(KeyboardItem::plain(labels::QUERIES));
    }

    if items.is_empty() {
        Reply::message(labels::NOTHING_AVAILABLE)
    } else {
        Reply::with_keyboard(labels::SELECT_OPTION, Keyboard::reply(&items))
    }
}

/// One button per tool category
pub fn categories<'a>(tools: impl IntoIterator<Item = &'a dyn ToolType>) -> Reply {
    let items: Vec<KeyboardItem> = tools
        .into_iter()
        .map(|tool| KeyboardItem::new(tool.display_name(), tool.kind().handle()))
        .collect();
    Reply::with_keyboard(labels::SELECT_OPTION, Keyboard::inline(&items))
}

/// Tools of a category, with "Change Criteria" once a tool is chosen
pub fn tools(tool: &dyn ToolType, tool_selected: bool) -> Reply {
    let mut items: Vec<KeyboardItem> = tool
        .tools()
        .iter()
        .map(|entry| entry_item(&entry.label, &entry.key))
        .collect();
    if tool_selected {
        items.push(KeyboardItem::plain(labels::CHANGE_CRITERIA).per_row(1).row_before());
    }
    Reply::with_keyboard(labels::SELECT_OPTION, Keyboard::inline(&items))
}

/// Buttons for the nodes of a query folder
pub fn query_items(nodes: &[QueryNode]) -> Vec<KeyboardItem> {
    nodes
        .iter()
        .map(|node| {
            if node.is_folder() {
                let label = format!("{} {}", labels::FOLDER_MARKER, node.title);
                KeyboardItem::new(label, node.id.clone()).per_row(1).row_before().row_after()
            } else {
                entry_item(&node.title, &node.id)
            }
        })
        .collect()
}

/// Query folder picker
pub fn queries(nodes: &[QueryNode]) -> Reply {
    if nodes.is_empty() {
        return Reply::message(labels::EMPTY_FOLDER);
    }
    Reply::with_keyboard(labels::SELECT_OPTION, Keyboard::inline(&query_items(nodes)))
}

/// Controls under a result, followed by any extra choices
pub fn result_keyboard(offset: u32, paged: bool, extra: Vec<KeyboardItem>) -> Keyboard {
    let mut items = result_controls(offset, true, paged);
    items.extend(extra);
    Keyboard::inline(&items)
}
