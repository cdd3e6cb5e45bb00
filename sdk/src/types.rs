//! Module records and resolved states
//!
//! `ModuleRecord` is the persisted per-module state, `GlobalSwitch` is the
//! process-wide policy flag, and `ModuleState` is what the resolver derives
//! from the two.

use serde::{Deserialize, Serialize};

/// Persisted state of one catalog module
///
/// `installed` is not stored: a module is installed exactly when it has a
/// non-empty `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Stable module identifier (e.g. "gmp-gmpopenh264")
    pub id: String,

    /// User/preference controlled enable flag
    #[serde(default)]
    pub enabled: bool,

    /// Hidden modules are excluded from every listing
    #[serde(default)]
    pub hidden: bool,

    /// Installed version, empty when not installed
    #[serde(default)]
    pub version: String,

    /// Time of the last install or update check, 0 means never
    #[serde(default)]
    pub last_update_epoch_millis: i64,

    /// Whether background updates are permitted
    #[serde(default)]
    pub auto_update: bool,
}

impl ModuleRecord {
    /// Create a record with all-default (not installed, disabled) values
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: false,
            hidden: false,
            version: String::new(),
            last_update_epoch_millis: 0,
            auto_update: false,
        }
    }

    /// Whether a version has been recorded for this module
    pub fn is_installed(&self) -> bool {
        !self.version.is_empty()
    }

    /// Set the enabled flag
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the hidden flag
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Set the installed version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the last update timestamp
    pub fn with_last_update(mut self, epoch_millis: i64) -> Self {
        self.last_update_epoch_millis = epoch_millis;
        self
    }
}

/// Process-wide policy switch for restricted modules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSwitch {
    /// When false, restricted modules never activate
    pub eme_enabled: bool,
}

impl GlobalSwitch {
    pub fn new(eme_enabled: bool) -> Self {
        Self { eme_enabled }
    }
}

impl Default for GlobalSwitch {
    fn default() -> Self {
        Self { eme_enabled: true }
    }
}

/// Why a listed module is not active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisabledReason {
    /// No version recorded
    NotInstalled,
    /// Installed but the enabled flag is off
    DisabledByUser,
    /// Restricted module while the global switch is off
    GlobalPolicy,
}

/// Effective state of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum ModuleState {
    /// Hidden; must not appear in any listing
    Absent,
    /// Listed but never activated
    NeverActivate(DisabledReason),
    /// Listed and always activated
    AlwaysActivate,
}

impl ModuleState {
    /// Whether the module appears in listings at all
    pub fn is_listed(&self) -> bool {
        !matches!(self, Self::Absent)
    }

    /// Whether the module is active
    pub fn is_active(&self) -> bool {
        matches!(self, Self::AlwaysActivate)
    }

    /// The reason a listed module is inactive, if any
    pub fn disabled_reason(&self) -> Option<DisabledReason> {
        match self {
            Self::NeverActivate(reason) => Some(*reason),
            _ => None,
        }
    }

    /// Disabled by the global switch rather than by the module's own flags
    pub fn is_policy_disabled(&self) -> bool {
        self.disabled_reason() == Some(DisabledReason::GlobalPolicy)
    }

    /// Whether a front-end should show the "not installed / disabled" warning.
    ///
    /// Policy-disabled modules show the disabled postfix without the warning.
    pub fn show_warning(&self) -> bool {
        matches!(
            self.disabled_reason(),
            Some(DisabledReason::NotInstalled | DisabledReason::DisabledByUser)
        )
    }

    /// Whether a front-end should mark the module as disabled
    pub fn show_disabled_postfix(&self) -> bool {
        matches!(self, Self::NeverActivate(_))
    }

    /// Short label used by text output
    pub fn label(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::NeverActivate(_) => "never-activate",
            Self::AlwaysActivate => "always-activate",
        }
    }
}

/// Actions applicable to a module in its current state
///
/// There are deliberately no enable/disable actions: activation follows
/// from installation and the global switch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleActions {
    /// "Find updates" can be triggered
    pub find_updates: bool,
    /// The preferences/details view can be opened
    pub preferences: bool,
}

impl ModuleActions {
    /// No actions at all (hidden modules)
    pub const NONE: ModuleActions = ModuleActions {
        find_updates: false,
        preferences: false,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_defaults() {
        let record = ModuleRecord::new("m1");
        assert_eq!(record.id, "m1");
        assert!(!record.enabled);
        assert!(!record.hidden);
        assert!(!record.is_installed());
        assert_eq!(record.last_update_epoch_millis, 0);
        assert!(!record.auto_update);
    }

    #[test]
    fn test_installed_follows_version() {
        let record = ModuleRecord::new("m1").with_version("1.2.3.4");
        assert!(record.is_installed());
        let record = record.with_version("");
        assert!(!record.is_installed());
    }

    #[test]
    fn test_policy_disabled_hides_warning() {
        let state = ModuleState::NeverActivate(DisabledReason::GlobalPolicy);
        assert!(state.is_policy_disabled());
        assert!(!state.show_warning());
        assert!(state.show_disabled_postfix());
        assert!(!state.is_active());
    }

    #[test]
    fn test_state_serializes_with_reason() {
        let state = ModuleState::NeverActivate(DisabledReason::NotInstalled);
        let json = serde_json::to_value(state).unwrap();
        assert_eq!(json["state"], "never_activate");
        assert_eq!(json["reason"], "not_installed");
    }
}
