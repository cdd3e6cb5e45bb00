//! Configuration management
//!
//! This module handles loading, validation, and management of the provider
//! configuration. Configuration is stored in TOML format at
//! ~/.cdm-provider/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory
//! - **store**: Preference store backend and location
//! - **updates**: Local update manifest and check interval
//! - **catalog**: Extra module descriptors appended to the built-in catalog
//!
//! Module state itself (enabled, version, EME switch...) is not configuration;
//! it lives in the preference store.
//!
//! # Examples
//!
//! ```no_run
//! use cdm_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Data dir: {:?}", config.core.data_dir);
//! println!("Store backend: {:?}", config.store.backend);
//! # Ok(())
//! # }
//! ```

use sdk::catalog::{Catalog, ModuleDescriptor};
use sdk::errors::ProviderError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    pub core: CoreConfig,

    /// Preference store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Update settings
    #[serde(default)]
    pub updates: UpdatesConfig,

    /// Catalog additions
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Preference store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Nothing persisted across runs
    Memory,
    /// SQLite database file
    Sqlite,
}

/// Preference store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    /// Database path; defaults to `<data_dir>/prefs.db`
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
        }
    }
}

/// Update configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatesConfig {
    /// Local update manifest; defaults to `<data_dir>/updates.json`
    #[serde(default)]
    pub manifest_path: Option<PathBuf>,

    /// Minimum hours between automatic update checks
    #[serde(default = "default_check_interval_hours")]
    pub check_interval_hours: u64,
}

impl Default for UpdatesConfig {
    fn default() -> Self {
        Self {
            manifest_path: None,
            check_interval_hours: default_check_interval_hours(),
        }
    }
}

impl UpdatesConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_hours.saturating_mul(3600))
    }
}

/// Catalog configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Descriptors appended after the built-in modules
    #[serde(default)]
    pub extra: Vec<ModuleDescriptor>,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.cdm-provider")
}

fn default_backend() -> StoreBackend {
    StoreBackend::Sqlite
}

fn default_check_interval_hours() -> u64 {
    24
}

/// Upper bound for `check_interval_hours` (one year)
pub const MAX_CHECK_INTERVAL_HOURS: u64 = 24 * 365;

impl Config {
    /// Load configuration from the default location (~/.cdm-provider/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, ProviderError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ProviderError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ProviderError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ProviderError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| ProviderError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;
        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, ProviderError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let config = Self::default_config();

        // Written before path expansion so the file keeps the portable ~ form
        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| ProviderError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, toml_string)
            .map_err(|e| ProviderError::Config(format!("Failed to write config file: {}", e)))?;

        let mut config = config;
        config.validate_and_process()?;
        Ok(config)
    }

    /// Get the default configuration file path
    fn default_config_path() -> Result<PathBuf, ProviderError> {
        let home = dirs::home_dir().ok_or_else(|| {
            ProviderError::Config("Could not determine home directory".to_string())
        })?;

        Ok(home.join(".cdm-provider").join("config.toml"))
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig {
                log_level: default_log_level(),
                data_dir: default_data_dir(),
            },
            store: StoreConfig::default(),
            updates: UpdatesConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }

    /// Built-in catalog plus configured extras
    pub fn catalog(&self) -> Catalog {
        Catalog::builtin_with(self.catalog.extra.clone())
    }

    /// Resolved preference database path
    pub fn store_path(&self) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(|| self.core.data_dir.join("prefs.db"))
    }

    /// Resolved update manifest path
    pub fn manifest_path(&self) -> PathBuf {
        self.updates
            .manifest_path
            .clone()
            .unwrap_or_else(|| self.core.data_dir.join("updates.json"))
    }

    /// Validate and process configuration
    ///
    /// This method:
    /// - Validates the log level and check interval
    /// - Rejects catalog entries with empty ids
    /// - Expands ~ in paths
    fn validate_and_process(&mut self) -> Result<(), ProviderError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(ProviderError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.updates.check_interval_hours == 0 {
            return Err(ProviderError::Config(
                "check_interval_hours must be at least 1".to_string(),
            ));
        }

        if self.updates.check_interval_hours > MAX_CHECK_INTERVAL_HOURS {
            return Err(ProviderError::Config(format!(
                "check_interval_hours must be at most {}",
                MAX_CHECK_INTERVAL_HOURS
            )));
        }

        if let Some(entry) = self.catalog.extra.iter().find(|m| m.id.trim().is_empty()) {
            return Err(ProviderError::Config(format!(
                "Catalog entry '{}' has an empty id",
                entry.name
            )));
        }

        self.core.data_dir = expand_path(&self.core.data_dir)?;
        if let Some(path) = &self.store.path {
            self.store.path = Some(expand_path(path)?);
        }
        if let Some(path) = &self.updates.manifest_path {
            self.updates.manifest_path = Some(expand_path(path)?);
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, ProviderError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| ProviderError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| {
            ProviderError::Config("Could not determine home directory".to_string())
        })?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| ProviderError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
