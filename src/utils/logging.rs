//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for the bridge.

use tracing::{info, warn, error, debug};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use crate::config::LoggingConfig;
use crate::utils::errors::Result;

/// Initialize logging based on configuration.
///
/// The returned guard flushes the file writer on drop and must outlive the bot.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(&config.directory, &config.file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(non_blocking)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(file_layer)
        .init();

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log an inbound update before routing
pub fn log_update_received(chat_id: i64, update_id: Option<u32>, is_callback: bool, has_file: bool) {
    debug!(
        chat_id = chat_id,
        update_id = update_id,
        is_callback = is_callback,
        has_file = has_file,
        "Update received"
    );
}

/// Log wizard cursor movement
pub fn log_step_transition(chat_id: i64, from: Option<&str>, to: Option<&str>) {
    debug!(
        chat_id = chat_id,
        from = from,
        to = to,
        "Wizard step changed"
    );
}

/// Log a top-level menu switch
pub fn log_menu_switch(chat_id: i64, menu: &str) {
    info!(
        chat_id = chat_id,
        menu = menu,
        "Menu selected"
    );
}

/// Log a full session reset
pub fn log_session_reset(chat_id: i64, reason: &str) {
    info!(
        chat_id = chat_id,
        reason = reason,
        "Session reset"
    );
}

/// Log a rendered tool or query result
pub fn log_result_rendered(chat_id: i64, target: &str, text_len: usize, has_image: bool) {
    info!(
        chat_id = chat_id,
        target = target,
        text_len = text_len,
        has_image = has_image,
        "Result rendered"
    );
}

/// Log input that matched nothing in the current state
pub fn log_invalid_input(chat_id: i64, text: &str, state: &str) {
    warn!(
        chat_id = chat_id,
        text = text,
        state = state,
        "Invalid data received"
    );
}

/// Log an update dropped because the chat is not admitted
pub fn log_rejected_chat(chat_id: i64) {
    warn!(chat_id = chat_id, "Update from a chat that is not allowed");
}

/// Log API errors with context
pub fn log_api_error(api: &str, error: &str, context: Option<&str>) {
    error!(
        api = api,
        error = error,
        context = context,
        "API error occurred"
    );
}
