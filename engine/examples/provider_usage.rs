//! Example demonstrating an embedded module provider
//!
//! This example plugs a custom `InstallManager` into the provider, listens
//! for events on the message bus, and installs one module.

use async_trait::async_trait;
use cdm_engine::message_bus::{EventType, MessageBus};
use cdm_engine::prefs::MemoryPrefStore;
use cdm_engine::provider::ModuleProvider;
use sdk::{AddonCandidate, Catalog, InstallManager, InstallReceipt, ProviderError};
use std::sync::Arc;

/// Install manager that offers a fixed OpenH264 build
struct StaticInstaller;

#[async_trait]
impl InstallManager for StaticInstaller {
    async fn check_for_addons(&self) -> Result<Vec<AddonCandidate>, ProviderError> {
        Ok(vec![AddonCandidate::new("gmp-gmpopenh264", "1.4")])
    }

    async fn install_addon(&self, addon: &AddonCandidate) -> Result<InstallReceipt, ProviderError> {
        println!("Installing {} {}...", addon.id, addon.version);
        Ok(InstallReceipt {
            id: addon.id.clone(),
            version: addon.version.clone(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), ProviderError> {
    let bus = Arc::new(MessageBus::new());
    let mut events = bus.subscribe(EventType::All).await;

    let provider = ModuleProvider::new(
        Catalog::builtin(),
        Arc::new(MemoryPrefStore::new()),
        Arc::new(StaticInstaller),
        Arc::clone(&bus),
    );
    provider.startup().await?;

    println!("Before update:");
    for module in provider.list().await? {
        println!("  {:<20} {}", module.record.id, module.state.label());
    }

    provider.find_updates("gmp-gmpopenh264").await?;
    provider.set_enabled("gmp-gmpopenh264", true).await?;

    println!("After update:");
    for module in provider.list().await? {
        println!("  {:<20} {}", module.record.id, module.state.label());
    }

    provider.shutdown().await?;

    println!("Events:");
    while let Ok(event) = events.try_recv() {
        println!("  {:?}", event);
    }

    Ok(())
}
