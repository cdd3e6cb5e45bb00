//! Module provider
//!
//! The `ModuleProvider` owns the catalog, loads one `ModuleRecord` per catalog
//! entry from the preference store at startup, and serves listings resolved
//! through [`crate::resolver`]. User toggles write through to the store.
//! Update checks and installs go through the injected `InstallManager`
//! (see [`updates`]).
//!
//! # Lifecycle
//!
//! ```text
//! new ──► startup ──► (list / toggles / find_updates)* ──► shutdown
//!            ▲                                                │
//!            └────────────────────────────────────────────────┘
//! ```
//!
//! Hidden flags are captured at startup. Changing `media.{id}.hidden` takes
//! effect on the next startup; every other key is picked up by [`ModuleProvider::reload`].
//!
//! # Examples
//!
//! ```no_run
//! use cdm_engine::message_bus::MessageBus;
//! use cdm_engine::prefs::MemoryPrefStore;
//! use cdm_engine::provider::ModuleProvider;
//! use sdk::{Catalog, InstallManager};
//! use std::sync::Arc;
//!
//! # async fn example(installer: Arc<dyn InstallManager>) -> Result<(), sdk::ProviderError> {
//! let provider = ModuleProvider::new(
//!     Catalog::builtin(),
//!     Arc::new(MemoryPrefStore::new()),
//!     installer,
//!     Arc::new(MessageBus::new()),
//! );
//! provider.startup().await?;
//! for module in provider.list().await? {
//!     println!("{} {}", module.record.id, module.state.label());
//! }
//! provider.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use sdk::catalog::{Catalog, ModuleDescriptor};
use sdk::errors::ProviderError;
use sdk::install::InstallManager;
use sdk::types::{GlobalSwitch, ModuleActions, ModuleRecord, ModuleState};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::message_bus::{Event, MessageBus};
use crate::prefs::{self, keys, ModuleKey, PrefStore, PrefValue};
use crate::resolver;

pub mod updates;

pub use updates::{UpdateOutcome, UpdateReport, UpdateScope};

/// A module as a front-end sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleView {
    pub descriptor: ModuleDescriptor,
    pub record: ModuleRecord,
    pub restricted: bool,
    pub state: ModuleState,
    pub actions: ModuleActions,
}

/// Provider of installable decryption modules
pub struct ModuleProvider {
    catalog: Catalog,
    store: Arc<dyn PrefStore>,
    installer: Arc<dyn InstallManager>,
    bus: Arc<MessageBus>,
    /// `None` until startup, catalog order afterwards
    records: RwLock<Option<Vec<ModuleRecord>>>,
    /// Module ids with a check/install sequence outstanding
    in_flight: Mutex<HashSet<String>>,
}

impl ModuleProvider {
    /// Create a provider. Nothing is read until [`startup`](Self::startup).
    pub fn new(
        catalog: Catalog,
        store: Arc<dyn PrefStore>,
        installer: Arc<dyn InstallManager>,
        bus: Arc<MessageBus>,
    ) -> Self {
        Self {
            catalog,
            store,
            installer,
            bus,
            records: RwLock::new(None),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    /// Load one record per catalog entry from the store
    pub async fn startup(&self) -> Result<(), ProviderError> {
        let records = self.load_records().await?;
        let listed = records.iter().filter(|r| !r.hidden).count();

        *self.records.write().await = Some(records);

        info!(
            "Module provider started: {} modules, {} listed",
            self.catalog.len(),
            listed
        );
        self.bus.publish(Event::ProviderStarted { listed }).await;
        Ok(())
    }

    /// Drop in-memory records and flush the store
    pub async fn shutdown(&self) -> Result<(), ProviderError> {
        let was_started = self.records.write().await.take().is_some();
        if !was_started {
            debug!("Shutdown requested for a provider that was not started");
        }

        self.store.flush().await?;

        info!("Module provider stopped");
        self.bus.publish(Event::ProviderStopped).await;
        Ok(())
    }

    pub async fn is_started(&self) -> bool {
        self.records.read().await.is_some()
    }

    /// Re-read every record from the store, keeping the hidden flags from startup
    pub async fn reload(&self) -> Result<(), ProviderError> {
        let fresh = self.load_records().await?;

        let mut guard = self.records.write().await;
        let records = guard.as_mut().ok_or(ProviderError::NotStarted)?;
        for (current, loaded) in records.iter_mut().zip(fresh) {
            let hidden = current.hidden;
            *current = loaded;
            current.hidden = hidden;
        }

        debug!("Reloaded {} module records", records.len());
        Ok(())
    }

    /// Current value of the global switch
    pub async fn global_switch(&self) -> Result<GlobalSwitch, ProviderError> {
        prefs::load_global_switch(self.store.as_ref()).await
    }

    /// Flip the global switch
    pub async fn set_eme_enabled(&self, enabled: bool) -> Result<(), ProviderError> {
        self.store.set_bool(keys::KEY_EME_ENABLED, enabled).await?;
        info!("EME {}", if enabled { "enabled" } else { "disabled" });
        self.bus.publish(Event::EmeToggled { enabled }).await;
        Ok(())
    }

    /// Snapshot of one record
    pub async fn record(&self, id: &str) -> Result<ModuleRecord, ProviderError> {
        self.catalog.require(id)?;

        let guard = self.records.read().await;
        let records = guard.as_ref().ok_or(ProviderError::NotStarted)?;
        records
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| ProviderError::InvalidRecord(id.to_string()))
    }

    /// Resolved view of one module, including hidden ones
    pub async fn module(&self, id: &str) -> Result<ModuleView, ProviderError> {
        let record = self.record(id).await?;
        let switch = self.global_switch().await?;
        self.view(record, switch)
    }

    /// Every listed module in catalog order. Hidden modules are omitted.
    pub async fn list(&self) -> Result<Vec<ModuleView>, ProviderError> {
        let switch = self.global_switch().await?;
        let snapshot = {
            let guard = self.records.read().await;
            guard.as_ref().ok_or(ProviderError::NotStarted)?.clone()
        };

        let mut views = Vec::with_capacity(snapshot.len());
        for record in snapshot {
            let view = self.view(record, switch)?;
            if view.state.is_listed() {
                views.push(view);
            }
        }
        Ok(views)
    }

    /// Set a module's enabled flag
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<ModuleRecord, ProviderError> {
        self.update_record(id, ModuleKey::Enabled, PrefValue::Bool(enabled), |record| {
            record.enabled = enabled
        })
        .await
    }

    /// Set whether background updates are permitted for a module
    pub async fn set_auto_update(&self, id: &str, auto_update: bool) -> Result<ModuleRecord, ProviderError> {
        self.update_record(id, ModuleKey::AutoUpdate, PrefValue::Bool(auto_update), |record| {
            record.auto_update = auto_update
        })
        .await
    }

    /// Persist a module's hidden flag. Takes effect on the next startup.
    pub async fn set_hidden(&self, id: &str, hidden: bool) -> Result<(), ProviderError> {
        self.catalog.require(id)?;
        self.store
            .set_bool(&ModuleKey::Hidden.for_module(id), hidden)
            .await?;
        info!("Module {} hidden={} (applies after restart)", id, hidden);
        Ok(())
    }

    /// Open the preferences/details view of a module.
    ///
    /// Returns `false` without publishing anything when the module is hidden.
    pub async fn open_preferences(&self, id: &str) -> Result<bool, ProviderError> {
        let view = self.module(id).await?;
        if !view.state.is_listed() {
            return Ok(false);
        }

        debug!("Displaying options for {}", id);
        self.bus
            .publish(Event::OptionsDisplayed { id: id.to_string() })
            .await;
        Ok(true)
    }

    /// Remove every provider key from the store and reset records to defaults,
    /// keeping the hidden flags from startup
    pub async fn reset(&self) -> Result<(), ProviderError> {
        for id in self.catalog.ids() {
            prefs::clear_module(self.store.as_ref(), id).await?;
        }
        for key in keys::GLOBAL_KEYS {
            self.store.clear(key).await?;
        }

        let mut guard = self.records.write().await;
        if let Some(records) = guard.as_mut() {
            for record in records.iter_mut() {
                let hidden = record.hidden;
                *record = ModuleRecord::new(record.id.clone());
                record.hidden = hidden;
            }
        }

        info!("Cleared all module provider settings");
        Ok(())
    }

    async fn load_records(&self) -> Result<Vec<ModuleRecord>, ProviderError> {
        let mut records = Vec::with_capacity(self.catalog.len());
        for id in self.catalog.ids() {
            records.push(prefs::load_record(self.store.as_ref(), id).await?);
        }
        Ok(records)
    }

    fn view(&self, record: ModuleRecord, switch: GlobalSwitch) -> Result<ModuleView, ProviderError> {
        let descriptor = self.catalog.require(&record.id)?.clone();
        let restricted = descriptor.is_restricted();
        let res = resolver::resolve(&record, switch, |_| restricted);
        Ok(ModuleView {
            descriptor,
            record,
            restricted,
            state: res.state,
            actions: res.actions,
        })
    }

    /// Write one key through to the store, then apply `mutate` to the record.
    ///
    /// The record write lock is held across the store write so readers see
    /// either the old or the new record.
    async fn update_record<M>(
        &self,
        id: &str,
        key: ModuleKey,
        value: PrefValue,
        mutate: M,
    ) -> Result<ModuleRecord, ProviderError>
    where
        M: FnOnce(&mut ModuleRecord),
    {
        self.catalog.require(id)?;

        let mut guard = self.records.write().await;
        let records = guard.as_mut().ok_or(ProviderError::NotStarted)?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ProviderError::InvalidRecord(id.to_string()))?;

        self.store.set(&key.for_module(id), value).await?;
        mutate(record);
        let updated = record.clone();
        drop(guard);

        debug!("Updated {} for {}", key.for_module(id), id);
        self.bus
            .publish(Event::ModuleStateChanged { id: id.to_string() })
            .await;
        Ok(updated)
    }
}

/// Milliseconds since the Unix epoch
pub(crate) fn now_millis() -> Result<i64, ProviderError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .map_err(|e| ProviderError::Store(format!("Failed to get current time: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message_bus::EventType;
    use crate::prefs::MemoryPrefStore;
    use async_trait::async_trait;
    use sdk::install::{AddonCandidate, InstallReceipt};
    use sdk::types::DisabledReason;

    struct NoInstaller;

    #[async_trait]
    impl InstallManager for NoInstaller {
        async fn check_for_addons(&self) -> Result<Vec<AddonCandidate>, ProviderError> {
            Ok(Vec::new())
        }

        async fn install_addon(&self, addon: &AddonCandidate) -> Result<InstallReceipt, ProviderError> {
            Err(ProviderError::InstallFailed {
                id: addon.id.clone(),
                reason: "unused".to_string(),
            })
        }
    }

    fn provider_with(store: Arc<MemoryPrefStore>) -> ModuleProvider {
        ModuleProvider::new(
            Catalog::builtin(),
            store,
            Arc::new(NoInstaller),
            Arc::new(MessageBus::new()),
        )
    }

    #[tokio::test]
    async fn test_not_started() {
        let provider = provider_with(Arc::new(MemoryPrefStore::new()));
        assert!(matches!(provider.list().await, Err(ProviderError::NotStarted)));
        assert!(matches!(
            provider.record("gmp-gmpopenh264").await,
            Err(ProviderError::NotStarted)
        ));
    }

    #[tokio::test]
    async fn test_unknown_id_rejected_before_start_check() {
        let provider = provider_with(Arc::new(MemoryPrefStore::new()));
        assert!(matches!(
            provider.record("gmp-unknown").await,
            Err(ProviderError::InvalidRecord(_))
        ));
    }

    #[tokio::test]
    async fn test_defaults_after_startup() {
        let provider = provider_with(Arc::new(MemoryPrefStore::new()));
        provider.startup().await.unwrap();

        let modules = provider.list().await.unwrap();
        assert_eq!(modules.len(), 2);
        for module in modules {
            assert_eq!(
                module.state,
                ModuleState::NeverActivate(DisabledReason::NotInstalled)
            );
            assert!(module.state.show_warning());
        }
    }

    #[tokio::test]
    async fn test_set_enabled_writes_through() {
        let store = Arc::new(MemoryPrefStore::new());
        let provider = provider_with(Arc::clone(&store));
        provider.startup().await.unwrap();

        let record = provider.set_enabled("gmp-gmpopenh264", true).await.unwrap();
        assert!(record.enabled);
        assert!(store
            .get_bool("media.gmp-gmpopenh264.enabled", false)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_hidden_applies_after_restart() {
        let provider = provider_with(Arc::new(MemoryPrefStore::new()));
        provider.startup().await.unwrap();

        provider.set_hidden("gmp-eme-adobe", true).await.unwrap();
        provider.reload().await.unwrap();
        assert_eq!(provider.list().await.unwrap().len(), 2);

        provider.shutdown().await.unwrap();
        provider.startup().await.unwrap();
        let ids: Vec<String> = provider
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.record.id)
            .collect();
        assert_eq!(ids, vec!["gmp-gmpopenh264".to_string()]);
    }

    #[tokio::test]
    async fn test_open_preferences_publishes() {
        let provider = provider_with(Arc::new(MemoryPrefStore::new()));
        let mut rx = provider.bus().subscribe(EventType::OptionsDisplayed).await;
        provider.startup().await.unwrap();

        assert!(provider.open_preferences("gmp-eme-adobe").await.unwrap());
        assert_eq!(
            rx.recv().await.unwrap(),
            Event::OptionsDisplayed {
                id: "gmp-eme-adobe".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_reset_clears_store() {
        let store = Arc::new(MemoryPrefStore::new());
        let provider = provider_with(Arc::clone(&store));
        provider.startup().await.unwrap();
        provider.set_enabled("gmp-gmpopenh264", true).await.unwrap();
        provider.set_eme_enabled(false).await.unwrap();

        provider.reset().await.unwrap();

        assert!(store.keys().await.unwrap().is_empty());
        assert!(!provider.record("gmp-gmpopenh264").await.unwrap().enabled);
        assert!(provider.global_switch().await.unwrap().eme_enabled);
    }

    #[tokio::test]
    async fn test_reset_keeps_startup_visibility() {
        let store = Arc::new(MemoryPrefStore::new());
        store
            .set_bool(&ModuleKey::Hidden.for_module("gmp-eme-adobe"), true)
            .await
            .unwrap();
        let provider = provider_with(Arc::clone(&store));
        provider.startup().await.unwrap();
        assert_eq!(provider.list().await.unwrap().len(), 1);

        provider.reset().await.unwrap();

        assert!(store.keys().await.unwrap().is_empty());
        assert!(provider.record("gmp-eme-adobe").await.unwrap().hidden);
        let ids: Vec<String> = provider
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.record.id)
            .collect();
        assert_eq!(ids, vec!["gmp-gmpopenh264".to_string()]);

        provider.shutdown().await.unwrap();
        provider.startup().await.unwrap();
        assert_eq!(provider.list().await.unwrap().len(), 2);
    }
}
