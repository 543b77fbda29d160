//! Error handling for Telegram Bridge
//!
//! This module defines the main error type used throughout the bot.
//! Step validation failures are not errors here: validators report them as
//! plain messages and the step engine turns them into prompts.

use thiserror::Error;

/// Main error type for the bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Telegram API error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("Telegram download error: {0}")]
    Download(#[from] teloxide::DownloadError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration loading error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Unknown query: {0}")]
    UnknownQuery(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Session invariant violated: {0}")]
    Invariant(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            BridgeError::Telegram(_) => true,
            BridgeError::Download(_) => true,
            BridgeError::Config(_) => false,
            BridgeError::ConfigLoad(_) => false,
            BridgeError::PermissionDenied(_) => false,
            BridgeError::UnknownTool(_) => false,
            BridgeError::UnknownQuery(_) => false,
            BridgeError::QueryFailed(_) => true,
            BridgeError::InvalidStateTransition { .. } => false,
            BridgeError::Invariant(_) => false,
            BridgeError::Redis(_) => true,
            BridgeError::Http(_) => true,
            BridgeError::Serialization(_) => false,
            BridgeError::Io(_) => true,
            BridgeError::UrlParse(_) => false,
            BridgeError::InvalidInput(_) => false,
            BridgeError::ServiceUnavailable(_) => true,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            BridgeError::Config(_) => ErrorSeverity::Critical,
            BridgeError::ConfigLoad(_) => ErrorSeverity::Critical,
            BridgeError::Invariant(_) => ErrorSeverity::Critical,
            BridgeError::InvalidStateTransition { .. } => ErrorSeverity::Critical,
            BridgeError::PermissionDenied(_) => ErrorSeverity::Warning,
            BridgeError::UnknownTool(_) => ErrorSeverity::Warning,
            BridgeError::UnknownQuery(_) => ErrorSeverity::Warning,
            BridgeError::InvalidInput(_) => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}
