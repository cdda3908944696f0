use async_trait::async_trait;

use kubehop_types::{ContextMap, Result, StoreConfig, StoreKind};

use crate::aks::AksStore;
use crate::eks::EksStore;
use crate::filesystem::FilesystemStore;
use crate::gke::GkeStore;
use crate::vault::VaultStore;

/// File name kubeconfigs conventionally carry, as in `~/.kube/config`
pub const DEFAULT_KUBECONFIG_NAME: &str = "config";

/// A source of kubeconfigs.
///
/// Implementations are cheap to construct and validate only local
/// preconditions (paths exist, credentials are discoverable); anything that
/// talks to a backend happens in the two fetch methods.
#[async_trait]
pub trait KubeconfigStore: Send + Sync {
    /// Which backend this store talks to
    fn kind(&self) -> StoreKind;

    /// Identifier distinguishing this store in state files and logs
    fn id(&self) -> &str;

    /// Discover every context the store can provide, each mapped to the
    /// location its kubeconfig can later be fetched from
    async fn list_contexts(&self) -> Result<ContextMap>;

    /// Fetch the kubeconfig bytes for a location previously returned by
    /// [`KubeconfigStore::list_contexts`]
    async fn get_kubeconfig(&self, location: &str) -> Result<Vec<u8>>;
}

/// Global fallbacks shared by every store
#[derive(Clone, Debug, Default)]
pub struct StoreDefaults {
    pub kubeconfig_name: Option<String>,
}

impl StoreDefaults {
    /// Kubeconfig file name for a store: its own override, else the global
    /// one, else [`DEFAULT_KUBECONFIG_NAME`]
    pub fn kubeconfig_name_for(&self, config: &StoreConfig) -> String {
        config
            .kubeconfig_name
            .clone()
            .or_else(|| self.kubeconfig_name.clone())
            .unwrap_or_else(|| DEFAULT_KUBECONFIG_NAME.to_string())
    }
}

/// Build the store a configuration entry describes.
///
/// Construction errors are reported to the caller as-is; whether they abort
/// anything is the caller's call, based on the entry's `required` flag.
pub fn new_store(
    config: &StoreConfig,
    defaults: &StoreDefaults,
) -> Result<Box<dyn KubeconfigStore>> {
    match config.kind {
        StoreKind::Filesystem => Ok(Box::new(FilesystemStore::new(config, defaults)?)),
        StoreKind::Vault => Ok(Box::new(VaultStore::new(config, defaults)?)),
        StoreKind::Eks => Ok(Box::new(EksStore::new(config)?)),
        StoreKind::Gke => Ok(Box::new(GkeStore::new(config)?)),
        StoreKind::Aks => Ok(Box::new(AksStore::new(config)?)),
    }
}
