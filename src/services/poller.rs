//! Long polling driver
//!
//! Fetches updates after the last one handled, records each update id before
//! handing the update to the dispatcher, and keeps going when a single update
//! fails. Updates are handled one at a time, so a chat never sees two of its
//! updates processed concurrently.

use std::sync::Arc;
use std::time::Duration;

use teloxide::payloads::GetUpdatesSetters;
use teloxide::prelude::*;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::BotConfig;
use crate::handlers::dispatcher::Dispatcher;
use crate::handlers::updates::normalize;
use crate::state::StateStorage;
use crate::utils::errors::Result;
use crate::utils::logging;

/// Offset that confirms every update up to `last_update_id`
fn offset_after(last_update_id: u32) -> Option<i32> {
    i32::try_from(last_update_id).ok()?.checked_add(1)
}

pub struct UpdatePoller {
    bot: Bot,
    dispatcher: Arc<Dispatcher>,
    storage: StateStorage,
    interval: Duration,
    timeout_seconds: u32,
}

impl UpdatePoller {
    pub fn new(bot: Bot, dispatcher: Arc<Dispatcher>, storage: StateStorage, config: &BotConfig) -> Self {
        Self {
            bot,
            dispatcher,
            storage,
            interval: Duration::from_millis(config.poll_interval_ms),
            timeout_seconds: config.poll_timeout_seconds,
        }
    }

    /// Offset for the next `getUpdates` call
    async fn next_offset(&self) -> Result<i32> {
        let offset = match self.storage.last_update_id().await? {
            None => 0,
            Some(id) => offset_after(id).unwrap_or_else(|| {
                warn!(last_update_id = id, "Stored update id is out of offset range, polling from the start");
                0
            }),
        };
        Ok(offset)
    }

    /// Fetch and handle one batch; returns how many updates arrived
    pub async fn poll_once(&self) -> Result<usize> {
        let offset = self.next_offset().await?;
        let updates = self
            .bot
            .get_updates()
            .offset(offset)
            .timeout(self.timeout_seconds)
            .await?;

        for update in &updates {
            // Mark first so a crash while handling never replays the update
            self.storage.set_last_update_id(update.id.0).await?;

            let Some(inbound) = normalize(update) else {
                continue;
            };
            let chat_id = inbound.chat_id;
            if let Err(e) = self.dispatcher.handle(inbound).await {
                if e.is_recoverable() {
                    warn!(chat_id, update_id = update.id.0, error = %e, "Update failed, moving on");
                } else {
                    error!(chat_id, update_id = update.id.0, severity = %e.severity(), error = %e, "Failed to handle update");
                }
            }
        }

        Ok(updates.len())
    }

    /// Poll until `shutdown` flips to true
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = self.interval.as_millis() as u64, "Starting long polling");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let batch = tokio::select! {
                result = self.poll_once() => result,
                _ = shutdown.changed() => break,
            };

            match batch {
                Ok(0) => tokio::time::sleep(self.interval).await,
                Ok(_) => {}
                Err(e) => {
                    logging::log_api_error("getUpdates", &e.to_string(), None);
                    warn!(error = %e, "Polling failed, retrying");
                    tokio::time::sleep(self.interval).await;
                }
            }
        }

        info!("Long polling stopped");
    }
}
