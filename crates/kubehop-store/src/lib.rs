//! Kubeconfig stores for kubehop
//!
//! Every place kubeconfigs live sits behind one trait: local files and
//! directories, a secrets vault, and managed control planes reached through
//! their provider CLIs. The cache decorator wraps any of them so nothing is
//! fetched twice within a run.

mod aks;
mod cache;
mod eks;
mod exec;
mod filesystem;
mod gke;
mod paths;
mod store;
mod vault;

pub use aks::AksStore;
pub use cache::CachedStore;
pub use eks::EksStore;
pub use filesystem::FilesystemStore;
pub use gke::GkeStore;
pub use paths::{expand_path, sanitize_filename};
pub use store::{DEFAULT_KUBECONFIG_NAME, KubeconfigStore, StoreDefaults, new_store};
pub use vault::VaultStore;
