// Response Cache
// identifier -> last successful score, bounded by count and age, persisted under "aiCache".
// Entries keep their stored order; a re-inserted identifier keeps its slot.

use crate::models::CacheEntry;
use crate::services::storage::{KeyValueStore, StoreError};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub const CACHE_KEY: &str = "aiCache";
pub const CACHE_MAX_ITEMS: usize = 500;
pub const CACHE_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

pub struct ResponseCache {
    store: Arc<dyn KeyValueStore>,
    entries: Vec<(String, CacheEntry)>,
    loaded: bool,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            entries: Vec::new(),
            loaded: false,
        }
    }

    /// Load once from the store, pruning and writing back if anything was dropped
    pub async fn load(&mut self, now: i64) -> Result<(), StoreError> {
        if self.loaded {
            return Ok(());
        }

        self.entries = match self.store.get(CACHE_KEY).await? {
            Some(Value::Object(map)) => map
                .into_iter()
                .filter_map(|(id, raw)| match serde_json::from_value::<CacheEntry>(raw) {
                    Ok(entry) => Some((id, entry)),
                    Err(e) => {
                        warn!(identifier = %id, error = %e, "[CACHE] dropping unreadable entry");
                        None
                    }
                })
                .collect(),
            _ => Vec::new(),
        };
        let before = self.entries.len();
        self.loaded = true;

        if self.prune(now) {
            debug!(before, after = self.entries.len(), "[CACHE] pruned on load");
            self.persist().await?;
        }
        Ok(())
    }

    /// Present entries are returned regardless of age; expiry happens in `prune`
    pub fn get(&self, identifier: &str) -> Option<&CacheEntry> {
        self.entries
            .iter()
            .find(|(id, _)| id == identifier)
            .map(|(_, entry)| entry)
    }

    pub async fn insert(&mut self, identifier: &str, entry: CacheEntry, now: i64) -> Result<(), StoreError> {
        match self.entries.iter_mut().find(|(id, _)| id == identifier) {
            Some(slot) => slot.1 = entry,
            None => self.entries.push((identifier.to_string(), entry)),
        }
        self.prune(now);
        self.persist().await
    }

    /// Drop expired entries, then keep the newest `CACHE_MAX_ITEMS`. Returns whether anything changed.
    pub fn prune(&mut self, now: i64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(_, e)| e.timestamp > 0 && now - e.timestamp <= CACHE_TTL_MS);

        // newest first; the stable sort keeps equal timestamps in their current order
        self.entries.sort_by(|a, b| b.1.timestamp.cmp(&a.1.timestamp));
        self.entries.truncate(CACHE_MAX_ITEMS);

        self.entries.len() != before
    }

    pub async fn clear(&mut self) -> Result<(), StoreError> {
        self.entries.clear();
        self.loaded = true;
        self.persist().await
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let mut map = Map::with_capacity(self.entries.len());
        for (id, entry) in &self.entries {
            map.insert(id.clone(), serde_json::to_value(entry)?);
        }
        self.store.set(CACHE_KEY, Value::Object(map)).await
    }
}
