//! Update checks and installs
//!
//! All installs go through the injected `InstallManager`. A module id can
//! have at most one check/install sequence outstanding; a second request for
//! the same id fails fast with `UpdateInProgress`. Installs run one module at
//! a time.
//!
//! A failed install leaves the record untouched: version and last-update are
//! only written once the install manager has reported success, and a failure
//! between the two store writes restores the previous version.

use sdk::errors::ProviderError;
use sdk::install::{AddonCandidate, InstallReceipt};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{now_millis, ModuleProvider};
use crate::message_bus::Event;
use crate::prefs::{keys, ModuleKey, PrefStore};

/// Result of a single-module update request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum UpdateOutcome {
    /// The module was installed or updated
    Installed(InstallReceipt),
    /// Offered, but already installed or not valid
    UpToDate,
    /// The check did not offer this module
    NotOffered,
    /// The module is hidden and has no update action
    Unavailable,
}

/// Which modules a provider-wide update may touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateScope {
    /// Every listed module
    All,
    /// Only modules whose auto-update flag is set
    AutoUpdateOnly,
}

/// A module that failed to install during a provider-wide update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedInstall {
    pub id: String,
    pub error: String,
}

/// Outcome of a provider-wide update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub installed: Vec<InstallReceipt>,
    pub failed: Vec<FailedInstall>,
    pub skipped: Vec<String>,
}

/// Removes its id from the in-flight set when dropped
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

impl ModuleProvider {
    /// Check for updates and install the candidate offered for `id`, if any
    pub async fn find_updates(&self, id: &str) -> Result<UpdateOutcome, ProviderError> {
        self.catalog.require(id)?;
        let view = self.module(id).await?;
        if !view.actions.find_updates {
            return Ok(UpdateOutcome::Unavailable);
        }

        let _guard = self.acquire(id)?;

        let candidates = self.check().await?;
        let Some(candidate) = candidates.into_iter().find(|c| c.id == id) else {
            debug!("Update check did not offer {}", id);
            return Ok(UpdateOutcome::NotOffered);
        };

        if !candidate.is_eligible() {
            debug!("Candidate for {} is installed or invalid", id);
            return Ok(UpdateOutcome::UpToDate);
        }

        let receipt = self.install_one(&candidate).await?;
        Ok(UpdateOutcome::Installed(receipt))
    }

    /// Check once and install every eligible candidate in `scope`, serially.
    ///
    /// Individual install failures are collected in the report; only a failed
    /// check or store error aborts the run.
    pub async fn update_all(&self, scope: UpdateScope) -> Result<UpdateReport, ProviderError> {
        if !self.is_started().await {
            return Err(ProviderError::NotStarted);
        }

        let candidates = self.check().await?;
        let mut report = UpdateReport::default();

        for candidate in candidates {
            if !self.catalog.contains(&candidate.id) {
                warn!("Ignoring update candidate outside the catalog: {}", candidate.id);
                report.skipped.push(candidate.id);
                continue;
            }

            let record = self.record(&candidate.id).await?;
            let in_scope = match scope {
                UpdateScope::All => true,
                UpdateScope::AutoUpdateOnly => record.auto_update,
            };
            if record.hidden || !in_scope || !candidate.is_eligible() {
                report.skipped.push(candidate.id);
                continue;
            }

            let _guard = match self.acquire(&candidate.id) {
                Ok(guard) => guard,
                Err(e) => {
                    report.failed.push(FailedInstall {
                        id: candidate.id.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            match self.install_one(&candidate).await {
                Ok(receipt) => report.installed.push(receipt),
                Err(e) => report.failed.push(FailedInstall {
                    id: candidate.id.clone(),
                    error: e.to_string(),
                }),
            }
        }

        info!(
            "Update run finished: {} installed, {} failed, {} skipped",
            report.installed.len(),
            report.failed.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Whether `interval` has passed since the last provider-wide check
    pub async fn is_check_due(&self, interval: Duration) -> Result<bool, ProviderError> {
        let last_check = self.store.get_int(keys::KEY_PROVIDER_LASTCHECK, 0).await?;
        let now_secs = now_millis()? / 1000;
        let interval_secs = i64::try_from(interval.as_secs()).unwrap_or(i64::MAX);
        Ok(now_secs.saturating_sub(last_check) >= interval_secs)
    }

    fn acquire(&self, id: &str) -> Result<InFlightGuard<'_>, ProviderError> {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(id.to_string()) {
            return Err(ProviderError::UpdateInProgress(id.to_string()));
        }
        Ok(InFlightGuard {
            set: &self.in_flight,
            id: id.to_string(),
        })
    }

    async fn check(&self) -> Result<Vec<AddonCandidate>, ProviderError> {
        let candidates = self.installer.check_for_addons().await.map_err(|e| match e {
            ProviderError::CheckFailed(_) => e,
            other => ProviderError::CheckFailed(other.to_string()),
        })?;

        let now_secs = now_millis()? / 1000;
        self.store.set_int(keys::KEY_PROVIDER_LASTCHECK, now_secs).await?;

        debug!("Update check returned {} candidates", candidates.len());
        Ok(candidates)
    }

    async fn install_one(&self, candidate: &AddonCandidate) -> Result<InstallReceipt, ProviderError> {
        let id = candidate.id.as_str();
        info!("Installing {} {}", id, candidate.version);

        let result = match self.installer.install_addon(candidate).await {
            Ok(receipt) if !receipt.version.is_empty() => Ok(receipt.version),
            Ok(_) if !candidate.version.is_empty() => Ok(candidate.version.clone()),
            Ok(_) => Err(ProviderError::InstallFailed {
                id: id.to_string(),
                reason: "install manager reported no version".to_string(),
            }),
            Err(ProviderError::InstallFailed { reason, .. }) => Err(ProviderError::InstallFailed {
                id: id.to_string(),
                reason,
            }),
            Err(other) => Err(ProviderError::InstallFailed {
                id: id.to_string(),
                reason: other.to_string(),
            }),
        };

        let version = match result {
            Ok(version) => version,
            Err(e) => {
                warn!("Install of {} failed: {}", id, e);
                self.bus
                    .publish(Event::InstallFailed {
                        id: id.to_string(),
                        error: e.to_string(),
                    })
                    .await;
                return Err(e);
            }
        };

        if let Err(e) = self.commit_install(id, &version, now_millis()?).await {
            warn!("Recording install of {} failed: {}", id, e);
            self.bus
                .publish(Event::InstallFailed {
                    id: id.to_string(),
                    error: e.to_string(),
                })
                .await;
            return Err(e);
        }

        info!("Installed {} {}", id, version);
        self.bus
            .publish(Event::ModuleInstalled {
                id: id.to_string(),
                version: version.clone(),
            })
            .await;

        Ok(InstallReceipt {
            id: id.to_string(),
            version,
        })
    }

    /// Persist version and last-update, then update the in-memory record
    async fn commit_install(&self, id: &str, version: &str, now: i64) -> Result<(), ProviderError> {
        let mut guard = self.records.write().await;
        let records = guard.as_mut().ok_or(ProviderError::NotStarted)?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ProviderError::InvalidRecord(id.to_string()))?;

        let version_key = ModuleKey::Version.for_module(id);
        self.store.set_string(&version_key, version).await?;

        if let Err(e) = self
            .store
            .set_int(&ModuleKey::LastUpdate.for_module(id), now)
            .await
        {
            if let Err(restore) = self.store.set_string(&version_key, &record.version).await {
                warn!("Failed to restore version of {}: {}", id, restore);
            }
            return Err(e);
        }

        record.version = version.to_string();
        record.last_update_epoch_millis = now;
        Ok(())
    }
}
