use std::path::Path;

use async_trait::async_trait;

use kubehop_types::{ContextMap, Error, Result, StoreConfig, StoreKind};

use crate::exec;
use crate::store::KubeconfigStore;

/// Clusters managed by AWS EKS, enumerated and fetched through the `aws`
/// CLI. Locations have the shape `eks_<region>_<cluster>`; the region slot
/// is `default` when none is configured, and regions never contain
/// underscores, so the cluster name can.
#[derive(Debug)]
pub struct EksStore {
    id: String,
    region: Option<String>,
    profile: Option<String>,
}

impl EksStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let id = config.store_id();
        let settings = config.eks.clone().unwrap_or_default();
        ensure_aws_credentials(&id, settings.credentials_dir.as_deref())?;

        Ok(Self {
            id,
            region: settings.region,
            profile: settings.profile,
        })
    }

    fn region_slot(&self) -> &str {
        self.region.as_deref().unwrap_or("default")
    }
}

#[async_trait]
impl KubeconfigStore for EksStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Eks
    }

    fn id(&self) -> &str {
        &self.id
    }

    async fn list_contexts(&self) -> Result<ContextMap> {
        let mut args = vec!["eks", "list-clusters", "--output", "json"];
        if let Some(region) = &self.region {
            args.extend(["--region", region]);
        }
        if let Some(profile) = &self.profile {
            args.extend(["--profile", profile]);
        }
        let value = exec::run_json("aws", &args).await?;

        let mut contexts = ContextMap::new();
        for name in cluster_names(&value) {
            let location = format!("eks_{}_{}", self.region_slot(), name);
            contexts.insert(name, location);
        }
        Ok(contexts)
    }

    async fn get_kubeconfig(&self, location: &str) -> Result<Vec<u8>> {
        let (region, cluster) = parse_location(location).ok_or_else(|| Error::InvalidLocation {
            kind: StoreKind::Eks,
            location: location.to_string(),
        })?;

        // The CLI writes a kubeconfig scoped to one cluster into a scratch
        // file, which is read back and discarded
        let tmp = tempfile::Builder::new()
            .prefix("kubehop-eks-")
            .tempfile()
            .map_err(|source| Error::TempFile {
                dir: std::env::temp_dir(),
                source,
            })?;
        let tmp_path = tmp.path().display().to_string();

        let mut args = vec![
            "eks",
            "update-kubeconfig",
            "--name",
            cluster,
            "--kubeconfig",
            &tmp_path,
        ];
        if region != "default" {
            args.extend(["--region", region]);
        }
        if let Some(profile) = &self.profile {
            args.extend(["--profile", profile]);
        }
        exec::run("aws", &args).await?;

        tokio::fs::read(tmp.path())
            .await
            .map_err(|source| Error::FileRead {
                path: tmp.path().to_path_buf(),
                source,
            })
    }
}

/// Credential discovery without any network round trip: an explicitly
/// configured directory must hold the credential files itself; the default
/// also accepts the usual environment variables.
fn ensure_aws_credentials(id: &str, override_dir: Option<&Path>) -> Result<()> {
    let has_credential_files =
        |dir: &Path| dir.join("credentials").is_file() || dir.join("config").is_file();

    let found = match override_dir {
        Some(dir) => has_credential_files(dir),
        None => {
            dirs::home_dir().is_some_and(|home| has_credential_files(&home.join(".aws")))
                || std::env::var_os("AWS_ACCESS_KEY_ID").is_some()
                || std::env::var_os("AWS_PROFILE").is_some()
        }
    };

    if found {
        Ok(())
    } else {
        Err(Error::construction(
            id,
            StoreKind::Eks,
            "no AWS credentials found (checked the credentials directory and AWS_ACCESS_KEY_ID/AWS_PROFILE)",
        ))
    }
}

fn cluster_names(value: &serde_json::Value) -> Vec<String> {
    value
        .get("clusters")
        .and_then(|clusters| clusters.as_array())
        .map(|clusters| {
            clusters
                .iter()
                .filter_map(|name| name.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_location(location: &str) -> Option<(&str, &str)> {
    location.strip_prefix("eks_")?.split_once('_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn eks_config(credentials_dir: std::path::PathBuf) -> StoreConfig {
        let mut config = StoreConfig::new(StoreKind::Eks);
        config.eks = Some(kubehop_types::EksSettings {
            region: Some("eu-west-1".to_string()),
            profile: None,
            credentials_dir: Some(credentials_dir),
        });
        config
    }

    #[test]
    fn test_missing_credentials_fail_construction() {
        let dir = TempDir::new().unwrap();
        let err = EksStore::new(&eks_config(dir.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, Error::StoreConstruction { .. }));
    }

    #[test]
    fn test_credential_file_enables_construction() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("credentials"), "[default]\n").unwrap();

        let store = EksStore::new(&eks_config(dir.path().to_path_buf())).unwrap();
        assert_eq!(store.kind(), StoreKind::Eks);
        assert_eq!(store.region_slot(), "eu-west-1");
    }

    #[test]
    fn test_cluster_listing_parses_names() {
        let value = json!({"clusters": ["main", "staging"]});
        assert_eq!(cluster_names(&value), vec!["main", "staging"]);
        assert!(cluster_names(&json!({})).is_empty());
    }

    #[test]
    fn test_location_round_trip() {
        assert_eq!(
            parse_location("eks_eu-west-1_main"),
            Some(("eu-west-1", "main"))
        );
        // Cluster names may contain underscores; regions never do
        assert_eq!(
            parse_location("eks_default_my_cluster"),
            Some(("default", "my_cluster"))
        );
        assert_eq!(parse_location("gke_project_zone_name"), None);
    }
}
