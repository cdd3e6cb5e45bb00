/// Integration tests for the module provider
///
/// Exercises the provider end to end over both store backends:
/// - default listing and warnings
/// - installed/enabled modules activating
/// - the EME switch disabling only restricted modules
/// - preferences views publishing events
/// - update checks installing exactly the requested module
/// - failed installs leaving records untouched
/// - hidden modules vanishing after restart
/// - concurrent updates of the same module
use async_trait::async_trait;
use cdm_engine::db::Database;
use cdm_engine::message_bus::{Event, EventType, MessageBus};
use cdm_engine::prefs::{MemoryPrefStore, PrefStore};
use cdm_engine::provider::{ModuleProvider, UpdateOutcome, UpdateScope};
use sdk::{
    AddonCandidate, Catalog, DisabledReason, InstallManager, InstallReceipt, ModuleState,
    ProviderError,
};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::{mpsc, Notify};

const OPENH264: &str = "gmp-gmpopenh264";
const EME_ADOBE: &str = "gmp-eme-adobe";

/// Offers a fixed candidate list and records every install request
struct RecordingInstaller {
    candidates: Vec<AddonCandidate>,
    fail_installs: bool,
    installed: Mutex<Vec<String>>,
}

impl RecordingInstaller {
    fn offering(candidates: Vec<AddonCandidate>) -> Self {
        Self {
            candidates,
            fail_installs: false,
            installed: Mutex::new(Vec::new()),
        }
    }

    fn failing(candidates: Vec<AddonCandidate>) -> Self {
        Self {
            fail_installs: true,
            ..Self::offering(candidates)
        }
    }

    fn installed(&self) -> Vec<String> {
        self.installed.lock().unwrap().clone()
    }
}

#[async_trait]
impl InstallManager for RecordingInstaller {
    async fn check_for_addons(&self) -> Result<Vec<AddonCandidate>, ProviderError> {
        Ok(self.candidates.clone())
    }

    async fn install_addon(&self, addon: &AddonCandidate) -> Result<InstallReceipt, ProviderError> {
        self.installed.lock().unwrap().push(addon.id.clone());
        if self.fail_installs {
            return Err(ProviderError::InstallFailed {
                id: addon.id.clone(),
                reason: "download interrupted".to_string(),
            });
        }
        Ok(InstallReceipt {
            id: addon.id.clone(),
            version: addon.version.clone(),
        })
    }
}

/// Blocks inside the update check until released
struct GatedInstaller {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl InstallManager for GatedInstaller {
    async fn check_for_addons(&self) -> Result<Vec<AddonCandidate>, ProviderError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(vec![AddonCandidate::new(OPENH264, "1.4")])
    }

    async fn install_addon(&self, addon: &AddonCandidate) -> Result<InstallReceipt, ProviderError> {
        Ok(InstallReceipt {
            id: addon.id.clone(),
            version: addon.version.clone(),
        })
    }
}

fn new_provider(store: Arc<dyn PrefStore>, installer: Arc<dyn InstallManager>) -> ModuleProvider {
    ModuleProvider::new(Catalog::builtin(), store, installer, Arc::new(MessageBus::new()))
}

fn no_updates() -> Arc<RecordingInstaller> {
    Arc::new(RecordingInstaller::offering(Vec::new()))
}

fn drain(rx: &mut mpsc::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_defaults_list_every_module_with_warning() {
    let provider = new_provider(Arc::new(MemoryPrefStore::new()), no_updates());
    provider.startup().await.unwrap();

    let modules = provider.list().await.unwrap();
    let ids: Vec<&str> = modules.iter().map(|m| m.record.id.as_str()).collect();
    assert_eq!(ids, vec![OPENH264, EME_ADOBE]);

    for module in &modules {
        assert_eq!(
            module.state,
            ModuleState::NeverActivate(DisabledReason::NotInstalled)
        );
        assert!(module.state.show_warning());
        assert!(module.actions.find_updates);
        assert!(!module.actions.preferences);
    }
}

#[tokio::test]
async fn test_installed_and_enabled_modules_activate() {
    let store = Arc::new(MemoryPrefStore::new());
    for id in [OPENH264, EME_ADOBE] {
        store
            .set_string(&format!("media.{}.version", id), "1.2.3.4")
            .await
            .unwrap();
        store
            .set_bool(&format!("media.{}.enabled", id), true)
            .await
            .unwrap();
    }

    let provider = new_provider(store, no_updates());
    provider.startup().await.unwrap();

    for module in provider.list().await.unwrap() {
        assert_eq!(module.state, ModuleState::AlwaysActivate);
        assert!(!module.state.show_warning());
        assert!(module.actions.preferences);
    }
}

#[tokio::test]
async fn test_eme_switch_disables_only_restricted_modules() {
    let store = Arc::new(MemoryPrefStore::new());
    let provider = new_provider(Arc::clone(&store) as Arc<dyn PrefStore>, no_updates());
    provider.startup().await.unwrap();

    let mut events = provider.bus().subscribe(EventType::EmeToggled).await;
    provider.set_eme_enabled(false).await.unwrap();

    let eme = provider.module(EME_ADOBE).await.unwrap();
    assert_eq!(
        eme.state,
        ModuleState::NeverActivate(DisabledReason::GlobalPolicy)
    );
    assert!(!eme.state.show_warning());

    let openh264 = provider.module(OPENH264).await.unwrap();
    assert_eq!(
        openh264.state,
        ModuleState::NeverActivate(DisabledReason::NotInstalled)
    );

    assert_eq!(drain(&mut events), vec![Event::EmeToggled { enabled: false }]);
    assert!(!store.get_bool("media.eme.enabled", true).await.unwrap());

    provider.set_eme_enabled(true).await.unwrap();
    let eme = provider.module(EME_ADOBE).await.unwrap();
    assert_eq!(
        eme.state,
        ModuleState::NeverActivate(DisabledReason::NotInstalled)
    );
}

#[tokio::test]
async fn test_preferences_publish_for_every_combination() {
    let store = Arc::new(MemoryPrefStore::new());
    let provider = new_provider(Arc::clone(&store) as Arc<dyn PrefStore>, no_updates());
    provider.startup().await.unwrap();
    let mut events = provider.bus().subscribe(EventType::OptionsDisplayed).await;

    for enabled in [false, true] {
        for version in ["", "1.2.3.4"] {
            for id in [OPENH264, EME_ADOBE] {
                store
                    .set_bool(&format!("media.{}.enabled", id), enabled)
                    .await
                    .unwrap();
                store
                    .set_string(&format!("media.{}.version", id), version)
                    .await
                    .unwrap();
            }
            provider.reload().await.unwrap();

            for id in [OPENH264, EME_ADOBE] {
                assert!(provider.open_preferences(id).await.unwrap());
                assert_eq!(
                    drain(&mut events),
                    vec![Event::OptionsDisplayed { id: id.to_string() }]
                );
            }
        }
    }
}

#[tokio::test]
async fn test_find_updates_installs_exactly_requested_module() {
    let store = Arc::new(MemoryPrefStore::new());
    let installer = Arc::new(RecordingInstaller::offering(vec![
        AddonCandidate::new(OPENH264, "1.4"),
        AddonCandidate::new(EME_ADOBE, "17"),
    ]));
    let provider = new_provider(Arc::clone(&store) as Arc<dyn PrefStore>, Arc::clone(&installer) as Arc<dyn InstallManager>);
    provider.startup().await.unwrap();
    let mut events = provider.bus().subscribe(EventType::ModuleInstalled).await;

    let outcome = provider.find_updates(EME_ADOBE).await.unwrap();
    assert_eq!(
        outcome,
        UpdateOutcome::Installed(InstallReceipt {
            id: EME_ADOBE.to_string(),
            version: "17".to_string(),
        })
    );
    assert_eq!(installer.installed(), vec![EME_ADOBE.to_string()]);

    let record = provider.record(EME_ADOBE).await.unwrap();
    assert_eq!(record.version, "17");
    assert!(record.last_update_epoch_millis > 0);
    assert_eq!(
        store.get_string("media.gmp-eme-adobe.version", "").await.unwrap(),
        "17"
    );
    assert!(store.get_int("media.gmp-manager.lastCheck", 0).await.unwrap() > 0);

    assert_eq!(
        drain(&mut events),
        vec![Event::ModuleInstalled {
            id: EME_ADOBE.to_string(),
            version: "17".to_string(),
        }]
    );

    // The other module was offered but never touched
    assert!(!provider.record(OPENH264).await.unwrap().is_installed());
}

#[tokio::test]
async fn test_failed_install_leaves_record_unchanged() {
    let store = Arc::new(MemoryPrefStore::new());
    store
        .set_string("media.gmp-gmpopenh264.version", "1.3")
        .await
        .unwrap();
    let installer = Arc::new(RecordingInstaller::failing(vec![AddonCandidate::new(
        OPENH264, "1.4",
    )]));
    let provider = new_provider(Arc::clone(&store) as Arc<dyn PrefStore>, installer);
    provider.startup().await.unwrap();
    let mut events = provider.bus().subscribe(EventType::InstallFailed).await;

    let before = provider.record(OPENH264).await.unwrap();
    let err = provider.find_updates(OPENH264).await.unwrap_err();
    assert!(matches!(err, ProviderError::InstallFailed { ref id, .. } if id == OPENH264));

    assert_eq!(provider.record(OPENH264).await.unwrap(), before);
    assert_eq!(
        store.get_string("media.gmp-gmpopenh264.version", "").await.unwrap(),
        "1.3"
    );

    let published = drain(&mut events);
    assert_eq!(published.len(), 1);
    assert!(matches!(&published[0], Event::InstallFailed { id, .. } if id == OPENH264));
}

#[tokio::test]
async fn test_hidden_module_vanishes_after_restart() {
    let store = Arc::new(MemoryPrefStore::new());
    let provider = new_provider(Arc::clone(&store) as Arc<dyn PrefStore>, no_updates());
    provider.startup().await.unwrap();

    provider.set_hidden(EME_ADOBE, true).await.unwrap();
    assert_eq!(provider.list().await.unwrap().len(), 2);

    provider.shutdown().await.unwrap();
    provider.startup().await.unwrap();

    let modules = provider.list().await.unwrap();
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].record.id, OPENH264);

    assert_eq!(
        provider.module(EME_ADOBE).await.unwrap().state,
        ModuleState::Absent
    );
    assert!(!provider.open_preferences(EME_ADOBE).await.unwrap());
    assert_eq!(
        provider.find_updates(EME_ADOBE).await.unwrap(),
        UpdateOutcome::Unavailable
    );
}

#[tokio::test]
async fn test_concurrent_update_of_same_module_rejected() {
    let installer = Arc::new(GatedInstaller {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let provider = Arc::new(new_provider(
        Arc::new(MemoryPrefStore::new()),
        Arc::clone(&installer) as Arc<dyn InstallManager>,
    ));
    provider.startup().await.unwrap();

    let first = {
        let provider = Arc::clone(&provider);
        tokio::spawn(async move { provider.find_updates(OPENH264).await })
    };

    installer.entered.notified().await;
    let second = provider.find_updates(OPENH264).await;
    assert!(matches!(second, Err(ProviderError::UpdateInProgress(ref id)) if id == OPENH264));

    installer.release.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert!(matches!(outcome, UpdateOutcome::Installed(_)));

    // The slot is free again once the first request completed
    installer.release.notify_one();
    let again = provider.find_updates(OPENH264).await.unwrap();
    assert!(matches!(again, UpdateOutcome::Installed(_)));
}

#[tokio::test]
async fn test_update_all_honors_auto_update_flag() {
    let installer = Arc::new(RecordingInstaller::offering(vec![
        AddonCandidate::new(OPENH264, "1.4"),
        AddonCandidate::new(EME_ADOBE, "17"),
        AddonCandidate::new("gmp-unknown", "1"),
    ]));
    let provider = new_provider(Arc::new(MemoryPrefStore::new()), Arc::clone(&installer) as Arc<dyn InstallManager>);
    provider.startup().await.unwrap();
    provider.set_auto_update(OPENH264, true).await.unwrap();

    let report = provider.update_all(UpdateScope::AutoUpdateOnly).await.unwrap();

    assert_eq!(installer.installed(), vec![OPENH264.to_string()]);
    assert_eq!(report.installed.len(), 1);
    assert!(report.failed.is_empty());
    assert_eq!(
        report.skipped,
        vec![EME_ADOBE.to_string(), "gmp-unknown".to_string()]
    );
}

#[tokio::test]
async fn test_reset_clears_every_provider_key() {
    let store = Arc::new(MemoryPrefStore::new());
    let provider = new_provider(Arc::clone(&store) as Arc<dyn PrefStore>, no_updates());
    provider.startup().await.unwrap();

    provider.set_enabled(OPENH264, true).await.unwrap();
    provider.set_eme_enabled(false).await.unwrap();
    provider.set_hidden(EME_ADOBE, true).await.unwrap();

    provider.reset().await.unwrap();

    assert!(store.keys().await.unwrap().is_empty());
    assert!(!provider.record(OPENH264).await.unwrap().enabled);
    assert!(provider.global_switch().await.unwrap().eme_enabled);
}

#[tokio::test]
async fn test_sqlite_store_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("prefs.db");

    {
        let database = Database::new(&db_path).await.unwrap();
        let installer = Arc::new(RecordingInstaller::offering(vec![AddonCandidate::new(
            OPENH264, "1.4",
        )]));
        let provider = new_provider(Arc::new(database.prefs()), installer);
        provider.startup().await.unwrap();
        provider.set_enabled(OPENH264, true).await.unwrap();
        provider.find_updates(OPENH264).await.unwrap();
        provider.set_hidden(EME_ADOBE, true).await.unwrap();
        provider.shutdown().await.unwrap();
        database.close().await.unwrap();
    }

    let database = Database::new(&db_path).await.unwrap();
    let provider = new_provider(Arc::new(database.prefs()), no_updates());
    provider.startup().await.unwrap();

    let modules = provider.list().await.unwrap();
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].record.version, "1.4");
    assert_eq!(modules[0].state, ModuleState::AlwaysActivate);

    provider.shutdown().await.unwrap();
    database.close().await.unwrap();
}
