//! In-memory preference store

use async_trait::async_trait;
use sdk::errors::ProviderError;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{PrefStore, PrefValue};

/// Preference store backed by a `HashMap`
///
/// Nothing is persisted; dropping the store drops all state.
#[derive(Debug, Default)]
pub struct MemoryPrefStore {
    values: RwLock<HashMap<String, PrefValue>>,
}

impl MemoryPrefStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with values
    pub fn with_values<I, K>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, PrefValue)>,
        K: Into<String>,
    {
        Self {
            values: RwLock::new(values.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }
}

#[async_trait]
impl PrefStore for MemoryPrefStore {
    async fn get(&self, key: &str) -> Result<Option<PrefValue>, ProviderError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: PrefValue) -> Result<(), ProviderError> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), ProviderError> {
        self.values.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, ProviderError> {
        Ok(self.values.read().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_clear() {
        let store = MemoryPrefStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", PrefValue::Int(7)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(PrefValue::Int(7)));

        store.clear("k").await.unwrap();
        store.clear("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_with_values() {
        let store = MemoryPrefStore::with_values([("media.eme.enabled", PrefValue::Bool(false))]);
        assert!(!store.get_bool("media.eme.enabled", true).await.unwrap());
    }
}
