//! CDM Provider SDK
//!
//! Shared types, traits, and error definitions for the module provider.
//! This crate is used by the engine and by install manager implementations.

/// Error types and handling
pub mod errors;

/// Module records, global switch, and resolved states
pub mod types;

/// Fixed catalog of known modules
pub mod catalog;

/// Install manager contract
pub mod install;

// Re-export commonly used types
pub use catalog::{Catalog, ModuleDescriptor, RESTRICTED_PREFIX};
pub use errors::{ProviderError, ProviderErrorExt};
pub use install::{AddonCandidate, InstallManager, InstallReceipt};
pub use types::{DisabledReason, GlobalSwitch, ModuleActions, ModuleRecord, ModuleState};
