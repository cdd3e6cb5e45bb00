//! Preference key names

/// Global switch for restricted (EME) modules
pub const KEY_EME_ENABLED: &str = "media.eme.enabled";

/// Epoch seconds of the last provider-wide update check
pub const KEY_PROVIDER_LASTCHECK: &str = "media.gmp-manager.lastCheck";

/// Whether provider log output is emitted at all
pub const KEY_LOGGING_DUMP: &str = "media.gmp.log.dump";

/// Provider log level on the 0-70 scale
pub const KEY_LOGGING_LEVEL: &str = "media.gmp.log.level";

/// Global keys owned by the provider
pub const GLOBAL_KEYS: [&str; 4] = [
    KEY_EME_ENABLED,
    KEY_PROVIDER_LASTCHECK,
    KEY_LOGGING_DUMP,
    KEY_LOGGING_LEVEL,
];

/// Per-module key kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKey {
    Enabled,
    Hidden,
    Version,
    LastUpdate,
    AutoUpdate,
}

impl ModuleKey {
    pub const ALL: [ModuleKey; 5] = [
        ModuleKey::Enabled,
        ModuleKey::Hidden,
        ModuleKey::Version,
        ModuleKey::LastUpdate,
        ModuleKey::AutoUpdate,
    ];

    fn suffix(self) -> &'static str {
        match self {
            ModuleKey::Enabled => "enabled",
            ModuleKey::Hidden => "hidden",
            ModuleKey::Version => "version",
            ModuleKey::LastUpdate => "lastUpdate",
            ModuleKey::AutoUpdate => "autoupdate",
        }
    }

    /// Full key for a module, e.g. `media.gmp-gmpopenh264.enabled`
    pub fn for_module(self, id: &str) -> String {
        format!("media.{}.{}", id, self.suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_keys() {
        assert_eq!(
            ModuleKey::LastUpdate.for_module("gmp-eme-adobe"),
            "media.gmp-eme-adobe.lastUpdate"
        );
        assert_eq!(
            ModuleKey::AutoUpdate.for_module("gmp-gmpopenh264"),
            "media.gmp-gmpopenh264.autoupdate"
        );
    }
}
