// Configuration Storage Service
// Settings live under two store keys: "settings" for preferences and "secrets" for API keys.

use crate::models::Settings;
use crate::services::storage::{KeyValueStore, StoreError};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

pub const SETTINGS_KEY: &str = "settings";
pub const SECRETS_KEY: &str = "secrets";
const SECRET_FIELDS: [&str; 2] = ["apiKey", "hfApiKey"];

pub struct ConfigStore {
    store: Arc<dyn KeyValueStore>,
}

fn as_object(value: Option<Value>) -> Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn is_set(value: Option<&Value>) -> bool {
    match value {
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    }
}

impl ConfigStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Move API keys that were saved alongside preferences into the secrets blob.
    /// Existing secrets are never overwritten.
    pub async fn migrate_secrets(&self) -> Result<(), StoreError> {
        let mut settings = as_object(self.store.get(SETTINGS_KEY).await?);
        if !SECRET_FIELDS.iter().any(|f| settings.contains_key(*f)) {
            return Ok(());
        }
        let mut secrets = as_object(self.store.get(SECRETS_KEY).await?);

        let mut migrated = 0;
        for field in SECRET_FIELDS {
            if let Some(value) = settings.remove(field) {
                if is_set(Some(&value)) && !is_set(secrets.get(field)) {
                    secrets.insert(field.to_string(), value);
                    migrated += 1;
                }
            }
        }

        if migrated > 0 {
            self.store.set(SECRETS_KEY, Value::Object(secrets)).await?;
        }
        self.store.set(SETTINGS_KEY, Value::Object(settings)).await?;
        info!(migrated, "[CONFIG] moved api keys out of settings");
        Ok(())
    }

    /// Load settings as defaults <- settings <- secrets
    pub async fn load(&self) -> Result<Settings, StoreError> {
        self.migrate_secrets().await?;

        let mut merged = match serde_json::to_value(Settings::default())? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        merged.extend(as_object(self.store.get(SETTINGS_KEY).await?));
        let secrets = as_object(self.store.get(SECRETS_KEY).await?);
        for field in SECRET_FIELDS {
            if let Some(value) = secrets.get(field) {
                merged.insert(field.to_string(), value.clone());
            }
        }

        let settings: Settings = serde_json::from_value(Value::Object(merged))?;
        debug!(settings = ?settings, "[CONFIG] settings loaded");
        Ok(settings)
    }

    /// Save configuration, splitting API keys into the secrets blob
    pub async fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        let mut preferences = match serde_json::to_value(settings)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let mut secrets = Map::new();
        for field in SECRET_FIELDS {
            if let Some(value) = preferences.remove(field) {
                secrets.insert(field.to_string(), value);
            }
        }
        self.store.set(SETTINGS_KEY, Value::Object(preferences)).await?;
        self.store.set(SECRETS_KEY, Value::Object(secrets)).await
    }

    /// Load settings and open the change channel the orchestrator subscribes to
    pub async fn channel(&self) -> Result<(watch::Sender<Settings>, watch::Receiver<Settings>), StoreError> {
        let settings = self.load().await?;
        Ok(watch::channel(settings))
    }

    /// Persist new settings and notify every subscriber
    pub async fn save_and_notify(
        &self,
        settings: Settings,
        notify: &watch::Sender<Settings>,
    ) -> Result<(), StoreError> {
        self.save(&settings).await?;
        notify.send_replace(settings);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::MemoryStore;
    use serde_json::json;

    fn config_with(store: Arc<MemoryStore>) -> ConfigStore {
        ConfigStore::new(store)
    }

    #[tokio::test]
    async fn test_load_defaults_when_empty() {
        let store = Arc::new(MemoryStore::new());
        let settings = config_with(store).load().await.unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[tokio::test]
    async fn test_load_merges_settings_and_secrets() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(SETTINGS_KEY, json!({"provider": "gptzero", "threshold": 60}))
            .await
            .unwrap();
        store.set(SECRETS_KEY, json!({"apiKey": "gz-key"})).await.unwrap();

        let settings = config_with(store).load().await.unwrap();
        assert_eq!(settings.provider, "gptzero");
        assert_eq!(settings.threshold, 60);
        assert_eq!(settings.api_key, "gz-key");
        assert!(settings.local_only);
    }

    #[tokio::test]
    async fn test_migrate_moves_keys_without_overwriting() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(SETTINGS_KEY, json!({"apiKey": "old-gz", "hfApiKey": "old-hf", "threshold": 90}))
            .await
            .unwrap();
        store.set(SECRETS_KEY, json!({"hfApiKey": "kept-hf"})).await.unwrap();

        let config = config_with(store.clone());
        let settings = config.load().await.unwrap();
        assert_eq!(settings.api_key, "old-gz");
        assert_eq!(settings.hf_api_key, "kept-hf");
        assert_eq!(settings.threshold, 90);

        let stored = store.get(SETTINGS_KEY).await.unwrap().unwrap();
        assert!(stored.get("apiKey").is_none());
        assert!(stored.get("hfApiKey").is_none());
        assert_eq!(
            store.get(SECRETS_KEY).await.unwrap(),
            Some(json!({"apiKey": "old-gz", "hfApiKey": "kept-hf"}))
        );
    }

    #[tokio::test]
    async fn test_save_splits_secrets_and_notifies() {
        let store = Arc::new(MemoryStore::new());
        let config = config_with(store.clone());
        let (tx, mut rx) = config.channel().await.unwrap();

        let updated = Settings {
            hf_api_key: "hf-new".into(),
            local_only: false,
            ..Settings::default()
        };
        config.save_and_notify(updated.clone(), &tx).await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), updated);
        let stored = store.get(SETTINGS_KEY).await.unwrap().unwrap();
        assert!(stored.get("hfApiKey").is_none());
        assert_eq!(stored["localOnly"], json!(false));
        assert_eq!(config.load().await.unwrap(), updated);
    }
}
