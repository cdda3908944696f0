use std::fs;
use std::path::Path;

use async_trait::async_trait;
use kube::config::Kubeconfig;
use tracing::debug;

use kubehop_types::{ContextMap, Error, Result, StoreConfig, StoreKind};

use crate::exec;
use crate::store::{KubeconfigStore, StoreDefaults};

/// Location scheme for secrets, so vault locations are self-describing in
/// index files
const LOCATION_PREFIX: &str = "vault://";

/// Kubeconfigs kept in a HashiCorp Vault KV engine, one secret per cluster
/// with the kubeconfig under a field named like the kubeconfig file name.
///
/// All access goes through the `vault` CLI so the store works against
/// whatever auth and TLS setup the CLI is already configured for.
pub struct VaultStore {
    id: String,
    paths: Vec<String>,
    address: String,
    token: String,
    kubeconfig_name: String,
}

// The token is a live credential and must never reach logs or panics
impl std::fmt::Debug for VaultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultStore")
            .field("id", &self.id)
            .field("paths", &self.paths)
            .field("address", &self.address)
            .field("token", &"<redacted>")
            .field("kubeconfig_name", &self.kubeconfig_name)
            .finish()
    }
}

impl VaultStore {
    pub fn new(config: &StoreConfig, defaults: &StoreDefaults) -> Result<Self> {
        let id = config.store_id();
        if config.paths.is_empty() {
            return Err(Error::construction(
                &id,
                StoreKind::Vault,
                "at least one secret path must be configured",
            ));
        }

        let settings = config.vault.clone().unwrap_or_default();
        let address = settings
            .address
            .or_else(|| std::env::var("VAULT_ADDR").ok().filter(|a| !a.is_empty()))
            .ok_or_else(|| {
                Error::construction(
                    &id,
                    StoreKind::Vault,
                    "no vault address configured and VAULT_ADDR is unset",
                )
            })?;
        let token = resolve_token(&id, settings.token_file.as_deref())?;

        Ok(Self {
            id,
            paths: config.paths.clone(),
            address,
            token,
            kubeconfig_name: defaults.kubeconfig_name_for(config),
        })
    }

    fn command_env(&self) -> Vec<(&'static str, String)> {
        vec![
            ("VAULT_ADDR", self.address.clone()),
            ("VAULT_TOKEN", self.token.clone()),
        ]
    }

    async fn kv_list(&self, path: &str) -> Result<Vec<String>> {
        let value =
            exec::run_json_env("vault", &["kv", "list", "-format=json", path], &self.command_env())
                .await?;
        Ok(parse_listing(&value))
    }

    async fn read_secret_field(&self, secret_path: &str) -> Result<Option<String>> {
        let value = exec::run_json_env(
            "vault",
            &["kv", "get", "-format=json", secret_path],
            &self.command_env(),
        )
        .await?;
        Ok(secret_fields(&value)
            .and_then(|fields| fields.get(&self.kubeconfig_name))
            .and_then(|field| field.as_str())
            .map(str::to_string))
    }
}

#[async_trait]
impl KubeconfigStore for VaultStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Vault
    }

    fn id(&self) -> &str {
        &self.id
    }

    async fn list_contexts(&self) -> Result<ContextMap> {
        // Walk the KV tree iteratively; entries ending in '/' are folders
        let mut secrets = Vec::new();
        let mut stack = self.paths.clone();
        while let Some(path) = stack.pop() {
            for entry in self.kv_list(&path).await? {
                if let Some(folder) = entry.strip_suffix('/') {
                    stack.push(format!("{path}/{folder}"));
                } else {
                    secrets.push(format!("{path}/{entry}"));
                }
            }
        }
        secrets.sort();

        let mut contexts = ContextMap::new();
        for secret_path in secrets {
            let Some(content) = self.read_secret_field(&secret_path).await? else {
                debug!(
                    secret = %secret_path,
                    field = %self.kubeconfig_name,
                    "secret has no kubeconfig field"
                );
                continue;
            };
            match serde_yaml::from_str::<Kubeconfig>(&content) {
                Ok(kubeconfig) => {
                    let location = format!("{LOCATION_PREFIX}{secret_path}");
                    for context in &kubeconfig.contexts {
                        contexts
                            .entry(context.name.clone())
                            .or_insert_with(|| location.clone());
                    }
                }
                Err(err) => {
                    debug!(secret = %secret_path, error = %err, "skipping unparsable secret");
                }
            }
        }
        Ok(contexts)
    }

    async fn get_kubeconfig(&self, location: &str) -> Result<Vec<u8>> {
        let secret_path = location
            .strip_prefix(LOCATION_PREFIX)
            .ok_or_else(|| Error::InvalidLocation {
                kind: StoreKind::Vault,
                location: location.to_string(),
            })?;
        let content =
            self.read_secret_field(secret_path)
                .await?
                .ok_or_else(|| Error::KubeconfigParse {
                    location: location.to_string(),
                    reason: format!("secret has no '{}' field", self.kubeconfig_name),
                })?;
        Ok(content.into_bytes())
    }
}

/// Token resolution: an explicitly configured token file is authoritative;
/// otherwise `VAULT_TOKEN`, then the CLI's own `~/.vault-token`.
fn resolve_token(id: &str, token_file: Option<&Path>) -> Result<String> {
    if let Some(path) = token_file {
        return match fs::read_to_string(path) {
            Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            Ok(_) => Err(Error::construction(
                id,
                StoreKind::Vault,
                format!("token file {} is empty", path.display()),
            )),
            Err(err) => Err(Error::construction(
                id,
                StoreKind::Vault,
                format!("cannot read token file {}: {err}", path.display()),
            )),
        };
    }

    if let Ok(token) = std::env::var("VAULT_TOKEN") {
        if !token.trim().is_empty() {
            return Ok(token.trim().to_string());
        }
    }

    if let Some(home) = dirs::home_dir() {
        let default_file = home.join(".vault-token");
        if let Ok(token) = fs::read_to_string(&default_file) {
            if !token.trim().is_empty() {
                return Ok(token.trim().to_string());
            }
        }
    }

    Err(Error::construction(
        id,
        StoreKind::Vault,
        "no vault token found (checked VAULT_TOKEN and ~/.vault-token)",
    ))
}

/// `vault kv list -format=json` prints a bare JSON array of entry names
fn parse_listing(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Secret payload for both KV engine versions: v2 nests the fields under
/// `data.data`, v1 keeps them directly under `data`
fn secret_fields(value: &serde_json::Value) -> Option<&serde_json::Map<String, serde_json::Value>> {
    let data = value.get("data")?;
    if let Some(nested) = data.get("data").and_then(|d| d.as_object()) {
        return Some(nested);
    }
    data.as_object()
}
