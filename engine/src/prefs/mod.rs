//! Configuration store interface
//!
//! The provider reads and writes module state through a `PrefStore` passed in
//! explicitly; there is no process-wide preference singleton. Two backends ship
//! with the engine:
//!
//! - [`MemoryPrefStore`]: in-process map, used by tests and dry runs
//! - [`crate::db::SqlitePrefStore`]: SQLite file, used by the CLI
//!
//! # Keys
//!
//! Only the keys in [`keys`] are ever touched:
//!
//! | key | type |
//! |-----|------|
//! | `media.{id}.enabled` | bool |
//! | `media.{id}.hidden` | bool |
//! | `media.{id}.version` | string |
//! | `media.{id}.lastUpdate` | int (epoch millis) |
//! | `media.{id}.autoupdate` | bool |
//! | `media.eme.enabled` | bool |
//! | `media.gmp-manager.lastCheck` | int (epoch seconds) |
//! | `media.gmp.log.dump` | bool |
//! | `media.gmp.log.level` | int |

use async_trait::async_trait;
use sdk::errors::ProviderError;
use sdk::types::{GlobalSwitch, ModuleRecord};
use serde::{Deserialize, Serialize};

pub mod keys;
pub mod memory;

pub use keys::ModuleKey;
pub use memory::MemoryPrefStore;

/// A typed preference value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum PrefValue {
    Bool(bool),
    Int(i64),
    String(String),
}

impl PrefValue {
    /// Storage tag of this value
    pub fn kind(&self) -> &'static str {
        match self {
            PrefValue::Bool(_) => "bool",
            PrefValue::Int(_) => "int",
            PrefValue::String(_) => "string",
        }
    }

    /// Encode the payload as text
    pub fn encode(&self) -> String {
        match self {
            PrefValue::Bool(b) => b.to_string(),
            PrefValue::Int(i) => i.to_string(),
            PrefValue::String(s) => s.clone(),
        }
    }

    /// Decode a value from its storage tag and text payload
    pub fn decode(kind: &str, raw: &str) -> Result<Self, ProviderError> {
        match kind {
            "bool" => raw
                .parse()
                .map(PrefValue::Bool)
                .map_err(|_| ProviderError::Store(format!("Invalid bool payload: {}", raw))),
            "int" => raw
                .parse()
                .map(PrefValue::Int)
                .map_err(|_| ProviderError::Store(format!("Invalid int payload: {}", raw))),
            "string" => Ok(PrefValue::String(raw.to_string())),
            other => Err(ProviderError::Store(format!("Unknown value kind: {}", other))),
        }
    }
}

/// Key/value store holding provider state
///
/// Backends only implement `get`, `set`, `clear`, and `keys`; the typed
/// accessors are provided. A value stored under a different type than the
/// one requested reads as absent.
#[async_trait]
pub trait PrefStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<PrefValue>, ProviderError>;

    async fn set(&self, key: &str, value: PrefValue) -> Result<(), ProviderError>;

    /// Remove a key. Clearing a missing key is not an error.
    async fn clear(&self, key: &str) -> Result<(), ProviderError>;

    /// All keys currently set, in no particular order
    async fn keys(&self) -> Result<Vec<String>, ProviderError>;

    /// Flush pending writes. Called by the provider at shutdown.
    async fn flush(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn get_bool(&self, key: &str, default: bool) -> Result<bool, ProviderError> {
        Ok(match self.get(key).await? {
            Some(PrefValue::Bool(b)) => b,
            _ => default,
        })
    }

    async fn get_int(&self, key: &str, default: i64) -> Result<i64, ProviderError> {
        Ok(match self.get(key).await? {
            Some(PrefValue::Int(i)) => i,
            _ => default,
        })
    }

    async fn get_string(&self, key: &str, default: &str) -> Result<String, ProviderError> {
        Ok(match self.get(key).await? {
            Some(PrefValue::String(s)) => s,
            _ => default.to_string(),
        })
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<(), ProviderError> {
        self.set(key, PrefValue::Bool(value)).await
    }

    async fn set_int(&self, key: &str, value: i64) -> Result<(), ProviderError> {
        self.set(key, PrefValue::Int(value)).await
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<(), ProviderError> {
        self.set(key, PrefValue::String(value.to_string())).await
    }
}

/// Read a module record, filling in defaults for missing keys
pub async fn load_record(store: &dyn PrefStore, id: &str) -> Result<ModuleRecord, ProviderError> {
    Ok(ModuleRecord {
        id: id.to_string(),
        enabled: store.get_bool(&ModuleKey::Enabled.for_module(id), false).await?,
        hidden: store.get_bool(&ModuleKey::Hidden.for_module(id), false).await?,
        version: store.get_string(&ModuleKey::Version.for_module(id), "").await?,
        last_update_epoch_millis: store.get_int(&ModuleKey::LastUpdate.for_module(id), 0).await?,
        auto_update: store.get_bool(&ModuleKey::AutoUpdate.for_module(id), false).await?,
    })
}

/// Write every per-module key of a record
pub async fn save_record(store: &dyn PrefStore, record: &ModuleRecord) -> Result<(), ProviderError> {
    let id = record.id.as_str();
    store.set_bool(&ModuleKey::Enabled.for_module(id), record.enabled).await?;
    store.set_bool(&ModuleKey::Hidden.for_module(id), record.hidden).await?;
    store.set_string(&ModuleKey::Version.for_module(id), &record.version).await?;
    store
        .set_int(&ModuleKey::LastUpdate.for_module(id), record.last_update_epoch_millis)
        .await?;
    store.set_bool(&ModuleKey::AutoUpdate.for_module(id), record.auto_update).await?;
    Ok(())
}

/// Remove every per-module key of a module
pub async fn clear_module(store: &dyn PrefStore, id: &str) -> Result<(), ProviderError> {
    for key in ModuleKey::ALL {
        store.clear(&key.for_module(id)).await?;
    }
    Ok(())
}

/// Read the global switch. A missing key means EME is enabled.
pub async fn load_global_switch(store: &dyn PrefStore) -> Result<GlobalSwitch, ProviderError> {
    let eme_enabled = store.get_bool(keys::KEY_EME_ENABLED, true).await?;
    Ok(GlobalSwitch::new(eme_enabled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_encode_decode() {
        for value in [
            PrefValue::Bool(true),
            PrefValue::Int(1_356_998_400_000),
            PrefValue::String("1.2.3.4".to_string()),
            PrefValue::String(String::new()),
        ] {
            let decoded = PrefValue::decode(value.kind(), &value.encode()).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn test_decode_rejects_bad_payload() {
        assert!(PrefValue::decode("int", "abc").is_err());
        assert!(PrefValue::decode("float", "1.0").is_err());
    }

    #[tokio::test]
    async fn test_type_mismatch_reads_as_default() {
        let store = MemoryPrefStore::new();
        store.set_string("media.eme.enabled", "yes").await.unwrap();
        assert!(store.get_bool("media.eme.enabled", true).await.unwrap());
        assert!(!store.get_bool("media.eme.enabled", false).await.unwrap());
    }

    #[tokio::test]
    async fn test_record_save_load() {
        let store = MemoryPrefStore::new();
        let record = ModuleRecord::new("gmp-gmpopenh264")
            .with_enabled(true)
            .with_version("1.2.3.4")
            .with_last_update(1_357_041_600_000);

        save_record(&store, &record).await.unwrap();
        let loaded = load_record(&store, "gmp-gmpopenh264").await.unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_clear_module_leaves_other_modules() {
        let store = MemoryPrefStore::new();
        save_record(&store, &ModuleRecord::new("a").with_version("1")).await.unwrap();
        save_record(&store, &ModuleRecord::new("b").with_version("2")).await.unwrap();

        clear_module(&store, "a").await.unwrap();

        let keys = store.keys().await.unwrap();
        assert!(keys.iter().all(|k| !k.starts_with("media.a.")));
        assert_eq!(keys.iter().filter(|k| k.starts_with("media.b.")).count(), 5);
    }

    #[tokio::test]
    async fn test_global_switch_defaults_on() {
        let store = MemoryPrefStore::new();
        assert!(load_global_switch(&store).await.unwrap().eme_enabled);
        store.set_bool(keys::KEY_EME_ENABLED, false).await.unwrap();
        assert!(!load_global_switch(&store).await.unwrap().eme_enabled);
    }
}
