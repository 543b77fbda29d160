//! Services module
//!
//! Collaborators of the dispatcher: access policy, criteria providers,
//! session persistence backends and the Telegram transport and poller.

pub mod access;
pub mod catalog;
pub mod poller;
pub mod redis;
pub mod telegram;

pub use access::{AccessPolicy, ChatAccess};
pub use catalog::{Catalog, ChoiceProvider, ResultRenderer, StepSchemaProvider, Target};
pub use poller::UpdatePoller;
pub use redis::RedisSessionStore;
pub use telegram::{TelegramTransport, Transport};
