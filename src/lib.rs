//! Telegram Bridge
//!
//! A Telegram bot that lets allowed chats run built-in tools and saved
//! GraphQL queries. Each tool or query declares the criteria it needs; the
//! bot asks for them step by step through keyboards and replies with the
//! rendered result.

pub mod config;
pub mod handlers;
pub mod models;
pub mod queries;
pub mod services;
pub mod state;
pub mod tools;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{BridgeError, Result};

// Re-export main components for easy access
pub use handlers::Dispatcher;
pub use services::{Catalog, ChatAccess, TelegramTransport, Transport};
pub use state::{StateStorage, StepEngine};
pub use tools::ToolRegistry;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
