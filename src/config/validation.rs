//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::utils::errors::{BridgeError, Result};
use super::settings::{StorageBackend, UpdateMode};
use super::Settings;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_bot_config(&settings.bot)?;
    validate_storage_config(&settings.storage)?;
    validate_access_config(&settings.access)?;
    validate_queries_config(&settings.queries)?;
    validate_logging_config(&settings.logging)?;

    Ok(())
}

/// Validate bot configuration
fn validate_bot_config(config: &super::BotConfig) -> Result<()> {
    if config.token.is_empty() {
        return Err(BridgeError::Config(
            "Bot token is required".to_string()
        ));
    }

    if config.mode == UpdateMode::Webhook {
        let webhook_url = config.webhook_url.as_deref().ok_or_else(|| {
            BridgeError::Config("Webhook mode requires bot.webhook_url".to_string())
        })?;
        url::Url::parse(webhook_url)
            .map_err(|e| BridgeError::Config(format!("Invalid webhook URL {}: {}", webhook_url, e)))?;

        let listen = config.webhook_listen.as_deref().ok_or_else(|| {
            BridgeError::Config("Webhook mode requires bot.webhook_listen".to_string())
        })?;
        listen.parse::<SocketAddr>()
            .map_err(|e| BridgeError::Config(format!("Invalid webhook listen address {}: {}", listen, e)))?;
    }

    if config.poll_timeout_seconds > 50 {
        return Err(BridgeError::Config(
            "Poll timeout cannot exceed 50 seconds".to_string()
        ));
    }

    Ok(())
}

/// Validate session storage configuration
fn validate_storage_config(config: &super::StorageConfig) -> Result<()> {
    if config.backend == StorageBackend::Redis {
        match config.redis_url.as_deref() {
            Some(url) if !url.is_empty() => {}
            _ => {
                return Err(BridgeError::Config(
                    "Redis URL is required for the redis storage backend".to_string()
                ));
            }
        }
    }

    if config.prefix.is_empty() {
        return Err(BridgeError::Config(
            "Storage key prefix is required".to_string()
        ));
    }

    Ok(())
}

/// Validate chat admission configuration
fn validate_access_config(config: &super::AccessConfig) -> Result<()> {
    let mut seen = HashSet::new();
    for chat in &config.chats {
        if !seen.insert(chat.chat_id) {
            return Err(BridgeError::Config(
                format!("Chat {} is configured more than once", chat.chat_id)
            ));
        }

        if !chat.tools.is_empty() && chat.user.is_none() {
            return Err(BridgeError::Config(
                format!("Chat {} grants tools but has no user binding", chat.chat_id)
            ));
        }
    }

    Ok(())
}

/// Validate query catalog configuration
fn validate_queries_config(config: &super::QueriesConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    let endpoint = config.endpoint.as_deref().ok_or_else(|| {
        BridgeError::Config("Queries are enabled but queries.endpoint is missing".to_string())
    })?;
    url::Url::parse(endpoint)
        .map_err(|e| BridgeError::Config(format!("Invalid GraphQL endpoint {}: {}", endpoint, e)))?;

    if config.directory.is_empty() {
        return Err(BridgeError::Config(
            "Query directory is required".to_string()
        ));
    }

    if config.request_timeout_seconds == 0 {
        return Err(BridgeError::Config(
            "Query request timeout must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(BridgeError::Config(
            "Log level is required".to_string()
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(BridgeError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    Ok(())
}
