//! Storage registry configuration.

use serde::{Deserialize, Serialize};

/// Name resolved when a lookup does not name a storage.
pub const DEFAULT_STORAGE: &str = "main";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RegistryConfig {
    /// Storage used by unnamed lookups. Default: "main".
    pub default_storage: Option<String>,
}

impl RegistryConfig {
    pub fn effective_default_storage(&self) -> &str {
        self.default_storage.as_deref().unwrap_or(DEFAULT_STORAGE)
    }
}
