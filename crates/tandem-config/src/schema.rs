use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub bundles: BundlesConfig,
    pub stack: StackConfig,
    pub memory: MemoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BundlesConfig {
    /// Register the bundles embedded in the binary.
    pub load_builtins: bool,
    /// Directory scanned for `*.json` bundle descriptors.
    /// Example: "~/.tandem/bundles"
    pub custom_dir: Option<String>,
}

impl Default for BundlesConfig {
    fn default() -> Self {
        Self {
            load_builtins: true,
            custom_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StackConfig {
    pub shared_memory_enabled: bool,
    pub cross_bundle_automations_enabled: bool,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            shared_memory_enabled: true,
            cross_bundle_automations_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryConfig {
    pub write_access: WriteAccess,
}

/// Whether category ownership gates writes to shared memory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WriteAccess {
    /// Ownership is bookkeeping only; any bundle may write any category.
    #[default]
    Open,
    /// Writes are rejected unless the bundle owns the category.
    Enforced,
}
