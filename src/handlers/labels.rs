//! Fixed button labels and reply texts

pub const TOOLS: &str = "Tools 📋";
pub const QUERIES: &str = "Queries❓";
pub const PREVIOUS_STEP: &str = "⬅️ Previous Step";
pub const NEXT_STEP: &str = "Next Step ➡️";
pub const CHANGE_CRITERIA: &str = "Change Criteria 🔎";
pub const NEXT_RESULTS: &str = "Next Results ⏭️";
pub const PREVIOUS_RESULTS: &str = "⏮️ Previous Results";
pub const ALL: &str = "All";

pub const START_COMMAND: &str = "/start";
pub const CHAT_ID_COMMAND: &str = "/chatid";

pub const SELECT_OPTION: &str = "Please select an option.";
pub const SELECT_ANOTHER: &str = "Please select another one.";
pub const INVALID_DATA: &str = "Invalid data received.";
pub const NOTHING_AVAILABLE: &str = "There is nothing available for this chat.";
pub const EMPTY_FOLDER: &str = "This folder is empty.";
pub const NO_RESULT: &str = "There is no result to show.";
pub const FOLDER_MARKER: &str = "📂";

/// Prompt for a wizard step
pub fn step_prompt(label: &str, is_file: bool) -> String {
    if is_file {
        format!("Please upload the {}.", label)
    } else {
        format!("Please select the {}.", label)
    }
}
