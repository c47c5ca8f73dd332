// Stats Tracker
// Running counters plus the per-provider fallback flag. Every mutation is persisted.

use crate::models::{Method, Stats};
use crate::services::providers::{ProviderKind, GPTZERO_LIMIT};
use crate::services::storage::{KeyValueStore, StoreError};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const STATS_KEY: &str = "stats";

/// Overlay stored fields onto the defaults one at a time; a mistyped field keeps its default
fn merge_stored(stored: Value) -> Stats {
    let Value::Object(stored) = stored else {
        warn!("[STATS] stored stats are not an object, starting fresh");
        return Stats::default();
    };
    let mut merged = match serde_json::to_value(Stats::default()) {
        Ok(Value::Object(map)) => map,
        _ => return Stats::default(),
    };
    for (key, value) in stored {
        let previous = merged.insert(key.clone(), value);
        if let Err(e) = serde_json::from_value::<Stats>(Value::Object(merged.clone())) {
            warn!(field = %key, error = %e, "[STATS] ignoring unreadable stored field");
            match previous {
                Some(previous) => merged.insert(key, previous),
                None => merged.remove(&key),
            };
        }
    }
    serde_json::from_value(Value::Object(merged)).unwrap_or_default()
}

pub struct StatsTracker {
    store: Arc<dyn KeyValueStore>,
    stats: Stats,
    loaded: bool,
}

impl StatsTracker {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            stats: Stats::default(),
            loaded: false,
        }
    }

    pub async fn load(&mut self) -> Result<(), StoreError> {
        if self.loaded {
            return Ok(());
        }
        self.stats = match self.store.get(STATS_KEY).await? {
            Some(value) => merge_stored(value),
            None => Stats::default(),
        };
        self.loaded = true;
        Ok(())
    }

    async fn save(&self) -> Result<(), StoreError> {
        self.store.set(STATS_KEY, serde_json::to_value(&self.stats)?).await
    }

    pub async fn snapshot(&mut self) -> Result<Stats, StoreError> {
        self.load().await?;
        Ok(self.stats.clone())
    }

    pub fn is_fallback(&self) -> bool {
        self.stats.fallback_mode
    }

    pub fn api_chars_used(&self) -> u64 {
        self.stats.api_chars_used
    }

    /// A provider switch clears fallback mode; the quota always follows the provider
    pub async fn sync_provider(&mut self, provider: &str) -> Result<(), StoreError> {
        self.load().await?;
        let mut changed = false;

        if self.stats.last_provider != provider {
            info!(from = %self.stats.last_provider, to = provider, "[STATS] provider switched, fallback cleared");
            self.stats.last_provider = provider.to_string();
            self.stats.fallback_mode = false;
            changed = true;
        }

        let limit = ProviderKind::from_name(provider).api_limit();
        if self.stats.api_limit != limit {
            self.stats.api_limit = limit;
            changed = true;
        }

        if changed {
            self.save().await?;
        }
        Ok(())
    }

    pub async fn set_fallback_mode(&mut self, enabled: bool) -> Result<(), StoreError> {
        self.load().await?;
        if enabled && !self.stats.fallback_mode {
            warn!(provider = %self.stats.last_provider, "[STATS] entering fallback mode");
        }
        self.stats.fallback_mode = enabled;
        self.save().await
    }

    pub async fn record_score(
        &mut self,
        score: u8,
        method: Method,
        text_chars: u64,
        provider: ProviderKind,
    ) -> Result<(), StoreError> {
        self.load().await?;
        self.stats.total_analyzed += 1;
        let n = self.stats.total_analyzed as f64;
        let next_avg = (self.stats.avg_score * (n - 1.0) + f64::from(score)) / n;
        self.stats.avg_score = (next_avg * 10.0).round() / 10.0;

        if method == Method::Api {
            self.stats.api_chars_used += text_chars;
        }

        if provider == ProviderKind::GptZero && self.stats.api_chars_used >= GPTZERO_LIMIT {
            if !self.stats.fallback_mode {
                warn!(used = self.stats.api_chars_used, "[STATS] gptzero quota reached, entering fallback mode");
            }
            self.stats.fallback_mode = true;
        }

        debug!(
            score,
            method = method.as_str(),
            total = self.stats.total_analyzed,
            avg = self.stats.avg_score,
            "[STATS] score recorded"
        );
        self.save().await
    }

    pub async fn record_hidden(&mut self, delta: i64) -> Result<(), StoreError> {
        self.load().await?;
        let next = (self.stats.hidden_count as i64).saturating_add(delta);
        self.stats.hidden_count = next.max(0) as u64;
        self.save().await
    }

    /// Count a failure; `lastError` keeps only the latest message
    pub async fn record_error(&mut self, message: &str) -> Result<(), StoreError> {
        self.load().await?;
        self.stats.api_errors += 1;
        self.stats.last_error = message.to_string();
        warn!(errors = self.stats.api_errors, message, "[STATS] provider error recorded");
        self.save().await
    }

    pub async fn reset(&mut self) -> Result<(), StoreError> {
        self.stats = Stats::default();
        self.loaded = true;
        info!("[STATS] reset to defaults");
        self.save().await
    }
}
