//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub bot: BotConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub queries: QueriesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How updates reach the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    #[default]
    Polling,
    Webhook,
}

/// Telegram bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotConfig {
    pub token: String,
    #[serde(default)]
    pub mode: UpdateMode,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub webhook_listen: Option<String>,
    /// Expected `X-Telegram-Bot-Api-Secret-Token` header on webhook calls
    #[serde(default)]
    pub secret_token: Option<String>,
    #[serde(default)]
    pub allow_chat_id_command: bool,
    #[serde(default)]
    pub show_result_chart: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_poll_timeout_seconds")]
    pub poll_timeout_seconds: u32,
}

/// Session store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Redis,
}

/// Session storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub redis_url: Option<String>,
    pub prefix: String,
    /// Zero keeps entries until they are invalidated by tag
    pub ttl_seconds: u64,
}

/// A chat admitted to the bot
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AllowedChat {
    pub chat_id: i64,
    /// Identity of the CMS user bound to this chat
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub query_token: Option<String>,
    /// Tool category handles this chat may use
    #[serde(default)]
    pub tools: Vec<String>,
}

/// Chat admission configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AccessConfig {
    #[serde(default)]
    pub chats: Vec<AllowedChat>,
    #[serde(default)]
    pub allow_other_chats: bool,
    #[serde(default)]
    pub other_chats_query_token: Option<String>,
}

/// Query catalog and GraphQL endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueriesConfig {
    #[serde(default)]
    pub enabled: bool,
    pub directory: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub show_query: bool,
    pub request_timeout_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: String,
    pub file_prefix: String,
    #[serde(default)]
    pub json: bool,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_poll_timeout_seconds() -> u32 {
    30
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("BRIDGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::BridgeError> {
        super::validation::validate_settings(self)
    }

    /// Stable digest of the settings a session depends on.
    ///
    /// Sessions remember the digest they were created under; a mismatch means
    /// the operator changed something and the chat starts over.
    pub fn fingerprint(&self) -> u64 {
        let fields = FingerprintFields {
            token: &self.bot.token,
            show_result_chart: self.bot.show_result_chart,
            chats: &self.access.chats,
            allow_other_chats: self.access.allow_other_chats,
            other_chats_query_token: self.access.other_chats_query_token.as_deref(),
            queries_enabled: self.queries.enabled,
            queries_directory: &self.queries.directory,
            queries_endpoint: self.queries.endpoint.as_deref(),
        };
        let encoded = serde_json::to_vec(&fields).unwrap_or_default();

        let digest = Sha256::digest(&encoded);
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(prefix)
    }
}

/// Settings that shape a conversation, in a fixed serialization order
#[derive(Serialize)]
struct FingerprintFields<'a> {
    token: &'a str,
    show_result_chart: bool,
    chats: &'a [AllowedChat],
    allow_other_chats: bool,
    other_chats_query_token: Option<&'a str>,
    queries_enabled: bool,
    queries_directory: &'a str,
    queries_endpoint: Option<&'a str>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot: BotConfig {
                token: String::new(),
                mode: UpdateMode::Polling,
                webhook_url: None,
                webhook_listen: None,
                secret_token: None,
                allow_chat_id_command: false,
                show_result_chart: false,
                poll_interval_ms: default_poll_interval_ms(),
                poll_timeout_seconds: default_poll_timeout_seconds(),
            },
            storage: StorageConfig::default(),
            access: AccessConfig::default(),
            queries: QueriesConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            redis_url: None,
            prefix: "telegram-bridge:".to_string(),
            ttl_seconds: 0,
        }
    }
}

impl Default for QueriesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: "queries".to_string(),
            endpoint: None,
            show_query: false,
            request_timeout_seconds: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: "logs".to_string(),
            file_prefix: "telegram-bridge.log".to_string(),
            json: false,
        }
    }
}
