//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - list / show: resolved module listings
//! - enable / disable / auto-update / hide / unhide: per-module preferences
//! - eme: the global switch for restricted modules
//! - update: check the local manifest and install
//! - reset: clear every provider preference
//!
//! [`dispatch`] opens the configured store, starts the provider, runs one
//! handler and shuts the provider down again.

use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;

use sdk::types::{DisabledReason, ModuleState};

use crate::cli::Command;
use crate::config::{Config, StoreBackend};
use crate::db::Database;
use crate::installer::ManifestInstaller;
use crate::message_bus::MessageBus;
use crate::prefs::{keys, MemoryPrefStore, PrefStore, PrefValue};
use crate::provider::{ModuleProvider, ModuleView, UpdateOutcome, UpdateScope};
use crate::telemetry;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// A started provider plus the database backing it, if any
pub struct Session {
    pub provider: ModuleProvider,
    database: Option<Database>,
}

impl Session {
    /// Open the configured store and start a provider over it
    ///
    /// `log_level` is the level already installed by the caller; the logging
    /// preferences only raise or lower the provider's own target on top of it.
    pub async fn open(config: &Config, log_level: &str) -> Result<Self> {
        let (store, database): (Arc<dyn PrefStore>, Option<Database>) = match config.store.backend {
            StoreBackend::Sqlite => {
                let database = Database::new(&config.store_path())
                    .await
                    .context("Failed to open preference database")?;
                (Arc::new(database.prefs()), Some(database))
            }
            StoreBackend::Memory => (Arc::new(MemoryPrefStore::new()), None),
        };

        if let Some(filter) = logging_filter(store.as_ref(), log_level).await? {
            tracing::debug!("Applying log filter from preferences: {}", filter);
            telemetry::set_filter(&filter);
        }

        let installer = Arc::new(ManifestInstaller::new(config.manifest_path()));
        let provider = ModuleProvider::new(config.catalog(), store, installer, Arc::new(MessageBus::new()));
        provider.startup().await.context("Failed to start module provider")?;

        Ok(Self { provider, database })
    }

    /// Shut the provider down and close the database
    pub async fn close(self) -> Result<()> {
        self.provider.shutdown().await?;
        if let Some(database) = self.database {
            database.close().await?;
        }
        Ok(())
    }
}

/// Level chosen by `--log`, falling back to the configured level
pub fn effective_log_level<'a>(cli_level: Option<&'a str>, config: &'a Config) -> &'a str {
    cli_level.unwrap_or(&config.core.log_level)
}

/// Filter derived from `media.gmp.log.*` on top of `base_level`
async fn logging_filter(store: &dyn PrefStore, base_level: &str) -> Result<Option<String>> {
    let dump = store.get_bool(keys::KEY_LOGGING_DUMP, false).await?;
    let level = match store.get(keys::KEY_LOGGING_LEVEL).await? {
        Some(PrefValue::Int(level)) => Some(level),
        _ => None,
    };

    Ok(telemetry::filter_from_prefs(base_level, dump, level))
}

/// Run one command against a freshly started provider
pub async fn dispatch(
    command: Command,
    config: &Config,
    log_level: &str,
    format: OutputFormat,
) -> Result<()> {
    let session = Session::open(config, log_level).await?;
    let provider = &session.provider;

    let result = match command {
        Command::List => handle_list(provider, format).await,
        Command::Show { id } => handle_show(provider, &id, format).await,
        Command::Enable { id } => handle_set_enabled(provider, &id, true, format).await,
        Command::Disable { id } => handle_set_enabled(provider, &id, false, format).await,
        Command::AutoUpdate { id, state } => {
            handle_auto_update(provider, &id, state.is_on(), format).await
        }
        Command::Hide { id } => handle_set_hidden(provider, &id, true, format).await,
        Command::Unhide { id } => handle_set_hidden(provider, &id, false, format).await,
        Command::Eme { state } => handle_eme(provider, state.is_on(), format).await,
        Command::Update { id, force } => {
            handle_update(provider, id.as_deref(), force, config, format).await
        }
        Command::Reset => handle_reset(provider, format).await,
    };

    // Shut down even when the handler failed; its error wins
    let closed = session.close().await;
    result.and(closed)
}

/// List every visible module
pub async fn handle_list(provider: &ModuleProvider, format: OutputFormat) -> Result<()> {
    let modules = provider.list().await?;
    let switch = provider.global_switch().await?;

    match format {
        OutputFormat::Text => {
            if modules.is_empty() {
                println!("No modules available");
                return Ok(());
            }

            println!(
                "Modules (EME {}):",
                if switch.eme_enabled { "enabled" } else { "disabled" }
            );
            println!();
            for module in &modules {
                print_module(module);
                println!();
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "eme_enabled": switch.eme_enabled,
                "modules": modules,
                "count": modules.len()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Show one module and open its preferences view
pub async fn handle_show(provider: &ModuleProvider, id: &str, format: OutputFormat) -> Result<()> {
    let module = provider.module(id).await?;
    provider.open_preferences(id).await?;

    match format {
        OutputFormat::Text => {
            print_module(&module);
            println!("  Description: {}", module.descriptor.description);
            if let Some(url) = &module.descriptor.homepage_url {
                println!("  Homepage: {}", url);
            }
            if let Some(url) = &module.descriptor.license_url {
                println!("  License: {}", url);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&module)?);
        }
    }

    Ok(())
}

pub async fn handle_set_enabled(
    provider: &ModuleProvider,
    id: &str,
    enabled: bool,
    format: OutputFormat,
) -> Result<()> {
    provider.set_enabled(id, enabled).await?;
    let module = provider.module(id).await?;
    report_change(&module, if enabled { "enabled" } else { "disabled" }, format)
}

pub async fn handle_auto_update(
    provider: &ModuleProvider,
    id: &str,
    auto_update: bool,
    format: OutputFormat,
) -> Result<()> {
    provider.set_auto_update(id, auto_update).await?;
    let module = provider.module(id).await?;
    let change = if auto_update {
        "auto-update on"
    } else {
        "auto-update off"
    };
    report_change(&module, change, format)
}

pub async fn handle_set_hidden(
    provider: &ModuleProvider,
    id: &str,
    hidden: bool,
    format: OutputFormat,
) -> Result<()> {
    provider.set_hidden(id, hidden).await?;

    match format {
        OutputFormat::Text => {
            println!(
                "✓ {} will be {} on next start",
                id,
                if hidden { "hidden" } else { "shown" }
            );
        }
        OutputFormat::Json => {
            let output = json!({ "id": id, "hidden": hidden, "applies": "next_start" });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

pub async fn handle_eme(provider: &ModuleProvider, enabled: bool, format: OutputFormat) -> Result<()> {
    provider.set_eme_enabled(enabled).await?;
    let affected: Vec<String> = provider
        .list()
        .await?
        .into_iter()
        .filter(|m| m.restricted)
        .map(|m| m.record.id)
        .collect();

    match format {
        OutputFormat::Text => {
            println!("✓ EME {}", if enabled { "enabled" } else { "disabled" });
            if !affected.is_empty() {
                println!("  Affects: {}", affected.join(", "));
            }
        }
        OutputFormat::Json => {
            let output = json!({ "eme_enabled": enabled, "affected": affected });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// Update one module, or every auto-update module when `id` is `None`
///
/// The provider-wide run is skipped until the configured check interval has
/// passed, unless `force` is set.
pub async fn handle_update(
    provider: &ModuleProvider,
    id: Option<&str>,
    force: bool,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    match id {
        Some(id) => {
            let outcome = provider
                .find_updates(id)
                .await
                .with_context(|| format!("Update of {} failed", id))?;

            match format {
                OutputFormat::Text => match &outcome {
                    UpdateOutcome::Installed(receipt) => {
                        println!("✓ Installed {} {}", receipt.id, receipt.version)
                    }
                    UpdateOutcome::UpToDate => println!("{} is up to date", id),
                    UpdateOutcome::NotOffered => println!("No update offered for {}", id),
                    UpdateOutcome::Unavailable => println!("{} is not available", id),
                },
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&outcome)?);
                }
            }
        }
        None => {
            let interval = config.updates.check_interval();
            if !force && !provider.is_check_due(interval).await? {
                match format {
                    OutputFormat::Text => println!(
                        "Last check was less than {}h ago; use --force to check now",
                        config.updates.check_interval_hours
                    ),
                    OutputFormat::Json => println!("{}", json!({ "checked": false })),
                }
                return Ok(());
            }

            let report = provider.update_all(UpdateScope::AutoUpdateOnly).await?;

            match format {
                OutputFormat::Text => {
                    for receipt in &report.installed {
                        println!("✓ Installed {} {}", receipt.id, receipt.version);
                    }
                    for failure in &report.failed {
                        println!("✗ {}: {}", failure.id, failure.error);
                    }
                    if report.installed.is_empty() && report.failed.is_empty() {
                        println!("No updates installed");
                    }
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
            }
        }
    }

    Ok(())
}

pub async fn handle_reset(provider: &ModuleProvider, format: OutputFormat) -> Result<()> {
    provider.reset().await?;

    match format {
        OutputFormat::Text => println!("✓ Cleared all module provider settings"),
        OutputFormat::Json => println!("{}", json!({ "reset": true })),
    }
    Ok(())
}

fn report_change(module: &ModuleView, change: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("✓ {} {}", module.record.id, change);
            println!("  State: {}", state_line(module));
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(module)?);
        }
    }
    Ok(())
}

fn print_module(module: &ModuleView) {
    let record = &module.record;
    let postfix = if module.state.show_disabled_postfix() {
        " (disabled)"
    } else {
        ""
    };
    println!("{}{}  [{}]", module.descriptor.name, postfix, record.id);
    println!("  State: {}", state_line(module));

    if record.is_installed() {
        println!("  Version: {}", record.version);
    }
    if record.last_update_epoch_millis > 0 {
        let updated = chrono::DateTime::from_timestamp_millis(record.last_update_epoch_millis)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        println!("  Updated: {}", updated);
    }
    println!(
        "  Auto-update: {}",
        if record.auto_update { "on" } else { "off" }
    );

    let mut actions = Vec::new();
    if module.actions.find_updates {
        actions.push("find-updates");
    }
    if module.actions.preferences {
        actions.push("preferences");
    }
    if !actions.is_empty() {
        println!("  Actions: {}", actions.join(", "));
    }

    if module.state.show_warning() {
        println!("  ⚠ {}", warning_text(module.state));
    }
}

fn state_line(module: &ModuleView) -> String {
    match module.state.disabled_reason() {
        Some(reason) => format!("{} ({})", module.state.label(), reason_text(reason)),
        None => module.state.label().to_string(),
    }
}

fn reason_text(reason: DisabledReason) -> &'static str {
    match reason {
        DisabledReason::NotInstalled => "not installed",
        DisabledReason::DisabledByUser => "disabled",
        DisabledReason::GlobalPolicy => "EME disabled",
    }
}

fn warning_text(state: ModuleState) -> &'static str {
    match state.disabled_reason() {
        Some(DisabledReason::NotInstalled) => "Not installed yet; run `cdmctl update <id>`",
        Some(DisabledReason::DisabledByUser) => "Disabled; run `cdmctl enable <id>`",
        _ => "",
    }
}
