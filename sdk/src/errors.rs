//! Error types and handling
//!
//! This module provides the error types used throughout the module provider.
//! All errors implement the `ProviderErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! The state resolver itself is total and never produces an error; everything
//! here comes from catalog lookups, the configuration store, or the injected
//! install manager.

use thiserror::Error;

/// Trait for provider error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information.
pub trait ProviderErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is a static string and never echoes module ids, store paths,
    /// or install manager output.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried by the caller. This layer never
    /// retries on its own.
    fn is_recoverable(&self) -> bool;
}

/// Main provider error type
///
/// # Error Categories
///
/// - **Catalog**: module ids that the catalog does not know
/// - **Install**: check/install failures reported by the install manager
/// - **Lifecycle**: provider used before startup, concurrent updates
/// - **Store**: configuration store read/write failures
/// - **Configuration**: invalid or missing configuration file
///
/// # Examples
///
/// ```
/// use sdk::errors::{ProviderError, ProviderErrorExt};
///
/// let error = ProviderError::InvalidRecord("gmp-unknown".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(!error.is_recoverable());
///
/// let install = ProviderError::InstallFailed {
///     id: "gmp-gmpopenh264".to_string(),
///     reason: "download interrupted".to_string(),
/// };
/// assert!(install.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum ProviderError {
    // Catalog errors
    #[error("Module not in catalog: {0}")]
    InvalidRecord(String),

    // Install errors
    #[error("Install failed for {id}: {reason}")]
    InstallFailed { id: String, reason: String },

    #[error("Update check failed: {0}")]
    CheckFailed(String),

    #[error("Update already in progress for {0}")]
    UpdateInProgress(String),

    // Lifecycle errors
    #[error("Provider not started")]
    NotStarted,

    // Store errors
    #[error("Configuration store error: {0}")]
    Store(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderErrorExt for ProviderError {
    fn user_hint(&self) -> &str {
        match self {
            Self::InvalidRecord(_) => "Unknown module. Run 'cdmctl list' to see known modules",

            Self::InstallFailed { .. } => "Module installation failed. Try again later",
            Self::CheckFailed(_) => "Could not check for updates. Check your update source",
            Self::UpdateInProgress(_) => "An update for this module is already running",

            Self::NotStarted => "The provider has not been started",

            Self::Store(_) => "Could not access stored module settings",
            Self::Config(_) => "Check your config.toml file for errors",

            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // Non-recoverable errors
            Self::InvalidRecord(_) | Self::Config(_) => false,

            // All other errors are potentially recoverable
            _ => true,
        }
    }
}
