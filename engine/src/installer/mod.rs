//! Local update manifest install manager
//!
//! `ManifestInstaller` answers update checks from a JSON file on disk instead
//! of a remote update service. The file is a list of candidates:
//!
//! ```json
//! {
//!   "addons": [
//!     { "id": "gmp-gmpopenh264", "version": "1.4" },
//!     { "id": "gmp-eme-adobe", "version": "17", "is_valid": false }
//!   ]
//! }
//! ```
//!
//! The file is re-read on every check. A missing file means nothing is
//! offered.

use async_trait::async_trait;
use sdk::errors::ProviderError;
use sdk::install::{AddonCandidate, InstallManager, InstallReceipt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// On-disk update manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateManifest {
    #[serde(default)]
    pub addons: Vec<AddonCandidate>,
}

impl UpdateManifest {
    /// Parse manifest from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize manifest to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Install manager backed by a local update manifest
pub struct ManifestInstaller {
    path: PathBuf,
}

impl ManifestInstaller {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_manifest(&self) -> Result<UpdateManifest, ProviderError> {
        if !tokio::fs::try_exists(&self.path).await? {
            debug!("No update manifest at {}", self.path.display());
            return Ok(UpdateManifest::default());
        }

        let contents = tokio::fs::read_to_string(&self.path).await?;
        UpdateManifest::from_json(&contents)
            .map_err(|e| ProviderError::CheckFailed(format!("Invalid update manifest: {}", e)))
    }
}

#[async_trait]
impl InstallManager for ManifestInstaller {
    async fn check_for_addons(&self) -> Result<Vec<AddonCandidate>, ProviderError> {
        let manifest = self.read_manifest().await?;
        info!(
            "Update manifest {} offers {} modules",
            self.path.display(),
            manifest.addons.len()
        );
        Ok(manifest.addons)
    }

    async fn install_addon(&self, addon: &AddonCandidate) -> Result<InstallReceipt, ProviderError> {
        if !addon.is_valid {
            return Err(ProviderError::InstallFailed {
                id: addon.id.clone(),
                reason: "candidate is not valid".to_string(),
            });
        }
        if addon.version.is_empty() {
            return Err(ProviderError::InstallFailed {
                id: addon.id.clone(),
                reason: "candidate has no version".to_string(),
            });
        }

        Ok(InstallReceipt {
            id: addon.id.clone(),
            version: addon.version.clone(),
        })
    }
}
