//! Bot handlers module
//!
//! This module contains the update routing of the bridge:
//! - Dispatcher driving menus and the criteria wizard
//! - Keyboard layout and picker menus
//! - Intake of raw Telegram updates

pub mod dispatcher;
pub mod keyboard;
pub mod labels;
pub mod menus;
pub mod updates;

pub use dispatcher::{Dispatch, Dispatcher};
pub use keyboard::{Keyboard, KeyboardItem, KeyboardKind};
pub use updates::{normalize, update_handler};
