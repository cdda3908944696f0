use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ============================================================================
// Store Kinds
// ============================================================================

/// The backend a store entry talks to.
///
/// The kind is recorded verbatim in index and state files; a persisted index
/// is only reused by a store of the same kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Filesystem,
    Vault,
    Eks,
    Gke,
    Aks,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filesystem => "filesystem",
            Self::Vault => "vault",
            Self::Eks => "eks",
            Self::Gke => "gke",
            Self::Aks => "aks",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Configuration File Model
// ============================================================================

/// The whole configuration file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Configured kubeconfig stores, resolved in order
    #[serde(default)]
    pub stores: Vec<StoreConfig>,

    /// How long a persisted index stays fresh, in seconds. Stores without
    /// their own interval fall back to this; if neither is set the index is
    /// refreshed on every resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_index_after: Option<u64>,

    /// Default file name of kubeconfigs inside store paths
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig_name: Option<String>,
}

/// One `[[stores]]` entry of the configuration file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    pub kind: StoreKind,

    /// Identifier for state files and logs; defaults to the kind name, so a
    /// second store of the same kind needs an explicit id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// What the store enumerates: local files or directories for filesystem
    /// stores, secret paths for vault. The managed providers ignore this.
    #[serde(default)]
    pub paths: Vec<String>,

    /// Whether a construction failure of this store aborts resolution.
    /// Defaults to true; non-required stores are skipped with a warning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    /// Overrides the global kubeconfig file name for this store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig_name: Option<String>,

    /// Overrides the global index freshness interval, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_index_after: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault: Option<VaultSettings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eks: Option<EksSettings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gke: Option<GkeSettings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aks: Option<AksSettings>,
}

impl StoreConfig {
    pub fn new(kind: StoreKind) -> Self {
        Self {
            kind,
            id: None,
            paths: Vec::new(),
            required: None,
            kubeconfig_name: None,
            refresh_index_after: None,
            cache: None,
            vault: None,
            eks: None,
            gke: None,
            aks: None,
        }
    }

    /// Effective store id: the explicit id, else the kind name
    pub fn store_id(&self) -> String {
        self.id.clone().unwrap_or_else(|| self.kind.to_string())
    }

    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(true)
    }
}

// ============================================================================
// Cache Configuration
// ============================================================================

/// Which backing a store's cache uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// In-process map, forgotten when the process exits
    #[default]
    Memory,
    /// One file per fetched key, reused across invocations
    Filesystem,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub kind: CacheMode,

    /// Base directory for the filesystem backing; defaults to a `cache`
    /// subdirectory of the state directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

// ============================================================================
// Per-Kind Store Settings
// ============================================================================
//
// A `*_file` or `*_dir` override narrows credential discovery to exactly that
// location; discovery falls back to environment variables and conventional
// home-directory paths only when no override is configured.

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VaultSettings {
    /// Vault API address; falls back to `VAULT_ADDR`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// File holding the vault token; falls back to `VAULT_TOKEN`, then
    /// `~/.vault-token`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EksSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// AWS profile passed to the CLI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Directory searched for AWS credential files; defaults to `~/.aws`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GkeSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Service-account or application-default credentials file; defaults to
    /// `GOOGLE_APPLICATION_CREDENTIALS`, then the gcloud ADC location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_file: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AksSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,

    /// Directory holding the Azure CLI login state; defaults to `~/.azure`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_id_defaults_to_kind() {
        let config = StoreConfig::new(StoreKind::Filesystem);
        assert_eq!(config.store_id(), "filesystem");

        let mut named = StoreConfig::new(StoreKind::Filesystem);
        named.id = Some("work".to_string());
        assert_eq!(named.store_id(), "work");
    }

    #[test]
    fn test_stores_are_required_by_default() {
        let mut config = StoreConfig::new(StoreKind::Vault);
        assert!(config.is_required());

        config.required = Some(false);
        assert!(!config.is_required());
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let json = serde_json::to_string(&StoreKind::Filesystem).unwrap();
        assert_eq!(json, "\"filesystem\"");

        let kind: StoreKind = serde_json::from_str("\"eks\"").unwrap();
        assert_eq!(kind, StoreKind::Eks);
    }
}
