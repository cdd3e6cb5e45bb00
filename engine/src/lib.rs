//! CDM Provider Engine Library
//!
//! This library provides the module provider for content decryption and
//! codec plugins: preference storage, state resolution, and update installs.
//! It is used by both the `cdmctl` binary and integration tests.

/// Configuration management module
pub mod config;

/// Preference store abstraction and in-memory backend
pub mod prefs;

/// Database persistence module
pub mod db;

/// Effective state resolution
pub mod resolver;

/// Module provider lifecycle, listings, and updates
pub mod provider;

/// Install manager backed by a local update manifest
pub mod installer;

/// Message bus for inter-component communication
pub mod message_bus;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
