//! Telegram Bridge bot
//!
//! Main application entry point

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use tokio::sync::watch;
use tracing::{info, warn};

use telegram_bridge::{
    config::{Settings, StorageBackend, UpdateMode},
    handlers::{update_handler, Dispatcher},
    queries::{FsQueryCatalog, GraphQlRenderer},
    services::{AccessPolicy, Catalog, ChatAccess, RedisSessionStore, TelegramTransport, UpdatePoller},
    state::StateStorage,
    tools::ToolRegistry,
    utils::logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new().context("failed to load configuration")?;
    settings.validate().context("invalid configuration")?;

    // Initialize logging; the guard flushes the file writer on exit
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", telegram_bridge::info());

    // Session storage
    let storage = match settings.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory session storage; sessions are lost on restart");
            StateStorage::in_memory()
        }
        StorageBackend::Redis => {
            info!("Connecting to Redis...");
            let store = RedisSessionStore::new(&settings.storage).await?;
            store.ping().await.context("Redis is not reachable")?;
            StateStorage::new(Arc::new(store))
        }
    };

    let bot = Bot::new(&settings.bot.token);
    let access: Arc<dyn AccessPolicy> = Arc::new(ChatAccess::new(settings.access.clone()));

    // The stock binary serves saved queries only. Tools need backends from an
    // embedding application, registered on the `ToolRegistry` before the
    // catalog is built (see `telegram_bridge::tools`).
    let registry = ToolRegistry::new();
    if registry.is_empty() {
        info!("No tool backends registered; the Tools menu stays hidden");
    }
    let mut catalog = Catalog::new(registry);
    if settings.queries.enabled {
        info!(directory = %settings.queries.directory, "Loading saved queries");
        let queries = Arc::new(FsQueryCatalog::new(&settings.queries.directory));
        let runner = Arc::new(GraphQlRenderer::new(&settings.queries, access.clone())?);
        catalog = catalog.with_queries(queries, runner);
    }

    let transport = Arc::new(TelegramTransport::new(bot.clone()));
    let mode = settings.bot.mode;
    let bot_config = settings.bot.clone();
    let dispatcher = Arc::new(Dispatcher::new(
        settings,
        storage.clone(),
        access,
        Arc::new(catalog),
        transport,
    ));

    match mode {
        UpdateMode::Polling => {
            info!("Starting bot with polling mode...");
            bot.delete_webhook().await?;

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Shutdown requested");
                    let _ = shutdown_tx.send(true);
                }
            });

            UpdatePoller::new(bot, dispatcher, storage, &bot_config)
                .run(shutdown_rx)
                .await;
        }
        UpdateMode::Webhook => {
            let url: url::Url = bot_config
                .webhook_url
                .as_deref()
                .context("bot.webhook_url is required in webhook mode")?
                .parse()
                .context("bot.webhook_url is not a valid URL")?;
            let address: SocketAddr = bot_config
                .webhook_listen
                .as_deref()
                .unwrap_or("0.0.0.0:8443")
                .parse()
                .context("bot.webhook_listen is not a valid socket address")?;

            let mut options = webhooks::Options::new(address, url);
            if let Some(secret) = bot_config.secret_token.clone() {
                options = options.secret_token(secret);
            }

            info!(%address, "Starting bot with webhook mode...");
            let listener = webhooks::axum(bot.clone(), options).await?;

            teloxide::dispatching::Dispatcher::builder(bot, update_handler())
                .dependencies(dptree::deps![dispatcher])
                .enable_ctrlc_handler()
                .build()
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
        }
    }

    info!("Telegram bridge has been shut down.");
    Ok(())
}
