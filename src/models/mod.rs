//! Data models module
//!
//! This module contains the transport-independent shapes of inbound updates
//! and outbound replies.

pub mod reply;
pub mod update;

pub use reply::{ChartImage, RenderedResult, Reply};
pub use update::{FileKind, FileRef, InboundUpdate};
