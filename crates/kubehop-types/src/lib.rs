//! Shared types for kubehop
//!
//! This crate contains the configuration model and the error taxonomy used
//! across the kubehop crates.

mod config;
mod error;

pub use config::{
    AksSettings, CacheConfig, CacheMode, Config, EksSettings, GkeSettings, StoreConfig, StoreKind,
    VaultSettings,
};
pub use error::{Error, Result};

/// Mapping from context name to the location its kubeconfig can be fetched
/// from. Locations are opaque outside the store that produced them: a file
/// path for filesystem stores, a secret path for vault, a synthetic cluster
/// identifier for the managed providers.
pub type ContextMap = std::collections::BTreeMap<String, String>;
