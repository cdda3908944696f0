use std::path::Path;

use async_trait::async_trait;

use kubehop_types::{ContextMap, Error, Result, StoreConfig, StoreKind};

use crate::exec;
use crate::store::KubeconfigStore;

/// Clusters managed by Azure AKS, reached through the `az` CLI. Locations
/// use `/` separators, `aks/<resource group>/<cluster>`, because both Azure
/// resource-group and cluster names may contain underscores.
#[derive(Debug)]
pub struct AksStore {
    id: String,
    subscription: Option<String>,
}

impl AksStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let id = config.store_id();
        let settings = config.aks.clone().unwrap_or_default();
        ensure_azure_credentials(&id, settings.azure_dir.as_deref())?;

        Ok(Self {
            id,
            subscription: settings.subscription,
        })
    }
}

#[async_trait]
impl KubeconfigStore for AksStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Aks
    }

    fn id(&self) -> &str {
        &self.id
    }

    async fn list_contexts(&self) -> Result<ContextMap> {
        let mut args = vec!["aks", "list", "--output", "json"];
        if let Some(subscription) = &self.subscription {
            args.extend(["--subscription", subscription]);
        }
        let value = exec::run_json("az", &args).await?;

        let mut contexts = ContextMap::new();
        for (name, resource_group) in clusters(&value) {
            let location = format!("aks/{resource_group}/{name}");
            contexts.insert(name, location);
        }
        Ok(contexts)
    }

    async fn get_kubeconfig(&self, location: &str) -> Result<Vec<u8>> {
        let (resource_group, cluster) =
            parse_location(location).ok_or_else(|| Error::InvalidLocation {
                kind: StoreKind::Aks,
                location: location.to_string(),
            })?;

        // `--file -` makes the CLI print the kubeconfig instead of merging
        // it into one on disk
        let mut args = vec![
            "aks",
            "get-credentials",
            "--resource-group",
            resource_group,
            "--name",
            cluster,
            "--file",
            "-",
        ];
        if let Some(subscription) = &self.subscription {
            args.extend(["--subscription", subscription]);
        }
        exec::run("az", &args).await
    }
}

fn ensure_azure_credentials(id: &str, override_dir: Option<&Path>) -> Result<()> {
    let found = match override_dir {
        Some(dir) => dir.join("azureProfile.json").is_file(),
        None => {
            std::env::var_os("AZURE_CLIENT_ID").is_some()
                || dirs::home_dir()
                    .is_some_and(|home| home.join(".azure").join("azureProfile.json").is_file())
        }
    };

    if found {
        Ok(())
    } else {
        Err(Error::construction(
            id,
            StoreKind::Aks,
            "no Azure credentials found (run `az login` or set AZURE_CLIENT_ID)",
        ))
    }
}

fn clusters(value: &serde_json::Value) -> Vec<(String, String)> {
    value
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let name = entry.get("name")?.as_str()?;
                    let resource_group = entry.get("resourceGroup")?.as_str()?;
                    Some((name.to_string(), resource_group.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_location(location: &str) -> Option<(&str, &str)> {
    location.strip_prefix("aks/")?.split_once('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn aks_config(azure_dir: std::path::PathBuf) -> StoreConfig {
        let mut config = StoreConfig::new(StoreKind::Aks);
        config.aks = Some(kubehop_types::AksSettings {
            subscription: None,
            azure_dir: Some(azure_dir),
        });
        config
    }

    #[test]
    fn test_missing_login_state_fails_construction() {
        let dir = TempDir::new().unwrap();
        let err = AksStore::new(&aks_config(dir.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, Error::StoreConstruction { .. }));
    }

    #[test]
    fn test_login_state_enables_construction() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("azureProfile.json"), "{}").unwrap();

        let store = AksStore::new(&aks_config(dir.path().to_path_buf())).unwrap();
        assert_eq!(store.kind(), StoreKind::Aks);
    }

    #[test]
    fn test_cluster_listing_parses_name_and_resource_group() {
        let value = json!([
            {"name": "api", "resourceGroup": "team_platform", "powerState": {"code": "Running"}},
            {"name": "batch", "resourceGroup": "team-data"}
        ]);
        assert_eq!(
            clusters(&value),
            vec![
                ("api".to_string(), "team_platform".to_string()),
                ("batch".to_string(), "team-data".to_string())
            ]
        );
    }

    #[test]
    fn test_location_round_trip() {
        assert_eq!(
            parse_location("aks/team_platform/api_cluster"),
            Some(("team_platform", "api_cluster"))
        );
        assert_eq!(parse_location("eks_region_cluster"), None);
    }
}
