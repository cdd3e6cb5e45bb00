//! Catalog of known modules
//!
//! The provider only ever creates records for ids in the catalog. Any other id
//! is rejected with `ProviderError::InvalidRecord`.

use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;

/// Id prefix of modules gated by the global EME switch
pub const RESTRICTED_PREFIX: &str = "gmp-eme-";

/// Static description of one installable module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub homepage_url: Option<String>,
    #[serde(default)]
    pub license_url: Option<String>,
}

impl ModuleDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            homepage_url: None,
            license_url: None,
        }
    }

    /// Whether this module is subject to the global EME switch
    pub fn is_restricted(&self) -> bool {
        is_restricted_id(&self.id)
    }
}

/// Restricted predicate over module ids
pub fn is_restricted_id(id: &str) -> bool {
    id.starts_with(RESTRICTED_PREFIX)
}

/// Fixed, ordered set of known modules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    modules: Vec<ModuleDescriptor>,
}

impl Catalog {
    /// Build a catalog from descriptors, keeping the first entry for duplicate ids
    pub fn new(modules: Vec<ModuleDescriptor>) -> Self {
        let mut unique: Vec<ModuleDescriptor> = Vec::with_capacity(modules.len());
        for module in modules {
            if !unique.iter().any(|m| m.id == module.id) {
                unique.push(module);
            }
        }
        Self { modules: unique }
    }

    /// The built-in module set
    pub fn builtin() -> Self {
        let mut openh264 = ModuleDescriptor::new(
            "gmp-gmpopenh264",
            "OpenH264 Video Codec provided by Cisco Systems, Inc.",
            "Play back web video and use video chats.",
        );
        openh264.homepage_url = Some("http://www.openh264.org/".to_string());
        openh264.license_url = Some("http://www.openh264.org/BINARY_LICENSE.txt".to_string());

        let mut adobe = ModuleDescriptor::new(
            "gmp-eme-adobe",
            "Primetime Content Decryption Module provided by Adobe Systems, Incorporated",
            "Play back protected web video.",
        );
        adobe.homepage_url = Some("http://help.adobe.com/en_US/primetime/drm/HTML5_CDM".to_string());

        Self::new(vec![openh264, adobe])
    }

    /// Built-in modules followed by `extra`
    pub fn builtin_with(extra: Vec<ModuleDescriptor>) -> Self {
        let mut modules = Self::builtin().modules;
        modules.extend(extra);
        Self::new(modules)
    }

    /// Look up a descriptor by id
    pub fn get(&self, id: &str) -> Option<&ModuleDescriptor> {
        self.modules.iter().find(|module| module.id == id)
    }

    /// Look up a descriptor, rejecting ids outside the catalog
    pub fn require(&self, id: &str) -> Result<&ModuleDescriptor, ProviderError> {
        self.get(id)
            .ok_or_else(|| ProviderError::InvalidRecord(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.modules.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|module| module.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Parse a catalog from a JSON array of descriptors
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let modules: Vec<ModuleDescriptor> = serde_json::from_str(json)?;
        Ok(Self::new(modules))
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
