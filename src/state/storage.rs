//! State storage implementation
//!
//! This module defines the key-value [`SessionStore`] contract, an in-memory
//! implementation, and [`StateStorage`], the typed facade the dispatcher uses
//! to persist [`Session`]s and the process-wide polling offset.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::utils::errors::Result;
use super::session::Session;

/// Tag carried by every key the bridge writes
pub const GLOBAL_TAG: &str = "telegram-bridge";

/// Process-wide key holding the last processed update id
pub const LAST_UPDATE_KEY: &str = "last_processed_update_id";

/// Tag grouping all keys of one chat
pub fn chat_tag(chat_id: i64) -> String {
    format!("{}-{}", GLOBAL_TAG, chat_id)
}

/// Key-value store with tag-based invalidation.
///
/// Single-key operations must be atomic; `delete_by_tag` must look atomic to
/// callers.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String, tags: &[String]) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove every key carrying `tag`, returning how many were removed
    async fn delete_by_tag(&self, tag: &str) -> Result<usize>;
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, String>,
    tags: HashMap<String, HashSet<String>>,
}

/// Process-local store, suitable for a single bot instance and for tests
#[derive(Debug, Default, Clone)]
pub struct MemorySessionStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state.read().await.entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String, tags: &[String]) -> Result<()> {
        let mut state = self.state.write().await;
        state.entries.insert(key.to_string(), value);
        for tag in tags {
            state
                .tags
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.entries.remove(key);
        for keys in state.tags.values_mut() {
            keys.remove(key);
        }
        Ok(())
    }

    async fn delete_by_tag(&self, tag: &str) -> Result<usize> {
        let mut state = self.state.write().await;
        let keys = state.tags.remove(tag).unwrap_or_default();
        let mut removed = 0;
        for key in &keys {
            if state.entries.remove(key).is_some() {
                removed += 1;
            }
        }
        for members in state.tags.values_mut() {
            members.retain(|key| !keys.contains(key));
        }
        Ok(removed)
    }
}

/// Typed access to sessions and bridge-wide bookkeeping
#[derive(Clone)]
pub struct StateStorage {
    store: Arc<dyn SessionStore>,
}

impl StateStorage {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// In-memory storage, handy for tests and single-instance deployments
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStore::new()))
    }

    /// Load the session of a chat, if one exists
    pub async fn load_session(&self, chat_id: i64) -> Result<Option<Session>> {
        let key = Self::session_key(chat_id);
        match self.store.get(&key).await? {
            Some(data) => {
                let session = serde_json::from_str::<Session>(&data).map_err(|e| {
                    error!(chat_id = chat_id, error = %e, "Failed to deserialize session");
                    e
                })?;
                debug!(chat_id = chat_id, summary = %session.summary(), "Session loaded");
                Ok(Some(session))
            }
            None => {
                debug!(chat_id = chat_id, "No session stored");
                Ok(None)
            }
        }
    }

    /// Persist a session under its chat tag
    pub async fn save_session(&self, session: &Session) -> Result<()> {
        let key = Self::session_key(session.chat_id);
        let data = serde_json::to_string(session)?;
        debug!(chat_id = session.chat_id, data_length = data.len(), "Saving session");
        self.store
            .set(&key, data, &[GLOBAL_TAG.to_string(), chat_tag(session.chat_id)])
            .await
    }

    /// Drop everything stored for a chat
    pub async fn reset_chat(&self, chat_id: i64) -> Result<usize> {
        let removed = self.store.delete_by_tag(&chat_tag(chat_id)).await?;
        debug!(chat_id = chat_id, removed = removed, "Chat state invalidated");
        Ok(removed)
    }

    /// Last update id handled by the polling driver
    pub async fn last_update_id(&self) -> Result<Option<u32>> {
        Ok(self
            .store
            .get(LAST_UPDATE_KEY)
            .await?
            .and_then(|raw| raw.parse::<u32>().ok()))
    }

    pub async fn set_last_update_id(&self, update_id: u32) -> Result<()> {
        self.store
            .set(LAST_UPDATE_KEY, update_id.to_string(), &[GLOBAL_TAG.to_string()])
            .await
    }

    fn session_key(chat_id: i64) -> String {
        format!("session_{}", chat_id)
    }
}

impl std::fmt::Debug for StateStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStorage").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::schema::StepValue;

    #[tokio::test]
    async fn test_memory_store_basic_operations() {
        let store = MemorySessionStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "v".to_string(), &[]).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));

        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_by_tag_only_touches_tagged_keys() {
        let store = MemorySessionStore::new();
        let one = vec![GLOBAL_TAG.to_string(), chat_tag(1)];
        let two = vec![GLOBAL_TAG.to_string(), chat_tag(2)];
        store.set("session_1", "a".to_string(), &one).await.unwrap();
        store.set("extra_1", "b".to_string(), &one).await.unwrap();
        store.set("session_2", "c".to_string(), &two).await.unwrap();

        assert_eq!(store.delete_by_tag(&chat_tag(1)).await.unwrap(), 2);
        assert_eq!(store.get("session_1").await.unwrap(), None);
        assert_eq!(store.get("extra_1").await.unwrap(), None);
        assert_eq!(store.get("session_2").await.unwrap(), Some("c".to_string()));
        assert_eq!(store.delete_by_tag(&chat_tag(1)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_session_round_trip_and_reset() {
        let storage = StateStorage::in_memory();
        assert!(storage.load_session(5).await.unwrap().is_none());

        let mut session = Session::new(5);
        session.commit("timeframe", StepValue::Text("Today".to_string()));
        storage.save_session(&session).await.unwrap();

        let loaded = storage.load_session(5).await.unwrap().unwrap();
        assert_eq!(loaded, session);

        storage.reset_chat(5).await.unwrap();
        assert!(storage.load_session(5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_last_update_id_survives_chat_reset() {
        let storage = StateStorage::in_memory();
        assert_eq!(storage.last_update_id().await.unwrap(), None);

        storage.set_last_update_id(41).await.unwrap();
        storage.save_session(&Session::new(3)).await.unwrap();
        storage.reset_chat(3).await.unwrap();

        assert_eq!(storage.last_update_id().await.unwrap(), Some(41));
    }
}
