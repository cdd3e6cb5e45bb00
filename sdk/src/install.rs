//! Install manager contract
//!
//! The provider never downloads anything itself. It asks an injected
//! `InstallManager` for candidates and hands one candidate at a time back to
//! it for installation.
//!
//! # Example
//!
//! ```
//! use async_trait::async_trait;
//! use sdk::{AddonCandidate, InstallManager, InstallReceipt, ProviderError};
//!
//! struct NoUpdates;
//!
//! #[async_trait]
//! impl InstallManager for NoUpdates {
//!     async fn check_for_addons(&self) -> Result<Vec<AddonCandidate>, ProviderError> {
//!         Ok(Vec::new())
//!     }
//!
//!     async fn install_addon(&self, addon: &AddonCandidate) -> Result<InstallReceipt, ProviderError> {
//!         Err(ProviderError::InstallFailed {
//!             id: addon.id.clone(),
//!             reason: "nothing to install".to_string(),
//!         })
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;

/// A module offered by an update check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonCandidate {
    pub id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default = "default_true")]
    pub is_valid: bool,
    #[serde(default)]
    pub is_installed: bool,
}

fn default_true() -> bool {
    true
}

impl AddonCandidate {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            is_valid: true,
            is_installed: false,
        }
    }

    /// Valid and not yet installed
    pub fn is_eligible(&self) -> bool {
        self.is_valid && !self.is_installed
    }
}

/// Result of a successful install
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReceipt {
    pub id: String,
    pub version: String,
}

/// Check-for-updates and install boundary
///
/// `check_for_addons` yields a finite batch that is consumed once; calling it
/// again performs a fresh check. `install_addon` installs exactly one
/// candidate. Neither method touches provider state.
#[async_trait]
pub trait InstallManager: Send + Sync {
    /// Fetch the candidate modules available for install
    async fn check_for_addons(&self) -> Result<Vec<AddonCandidate>, ProviderError>;

    /// Install one candidate
    async fn install_addon(&self, addon: &AddonCandidate) -> Result<InstallReceipt, ProviderError>;
}
