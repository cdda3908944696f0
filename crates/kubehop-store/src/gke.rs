use std::path::{Path, PathBuf};

use async_trait::async_trait;

use kubehop_types::{ContextMap, Error, Result, StoreConfig, StoreKind};

use crate::exec;
use crate::store::KubeconfigStore;

/// Clusters managed by Google GKE, reached through the `gcloud` CLI.
/// Locations follow the scheme gcloud itself uses for context names,
/// `gke_<project>_<location>_<cluster>`; none of the three segments may
/// contain underscores.
#[derive(Debug)]
pub struct GkeStore {
    id: String,
    project: Option<String>,
}

impl GkeStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let id = config.store_id();
        let settings = config.gke.clone().unwrap_or_default();
        ensure_gcp_credentials(&id, settings.credentials_file.as_deref())?;

        Ok(Self {
            id,
            project: settings.project,
        })
    }

    fn project_slot(&self) -> &str {
        self.project.as_deref().unwrap_or("default")
    }
}

#[async_trait]
impl KubeconfigStore for GkeStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Gke
    }

    fn id(&self) -> &str {
        &self.id
    }

    async fn list_contexts(&self) -> Result<ContextMap> {
        let mut args = vec!["container", "clusters", "list", "--format=json"];
        if let Some(project) = &self.project {
            args.extend(["--project", project]);
        }
        let value = exec::run_json("gcloud", &args).await?;

        let mut contexts = ContextMap::new();
        for (name, cluster_location) in clusters(&value) {
            let location = format!("gke_{}_{cluster_location}_{name}", self.project_slot());
            contexts.insert(name, location);
        }
        Ok(contexts)
    }

    async fn get_kubeconfig(&self, location: &str) -> Result<Vec<u8>> {
        let (_, cluster_location, cluster) =
            parse_location(location).ok_or_else(|| Error::InvalidLocation {
                kind: StoreKind::Gke,
                location: location.to_string(),
            })?;

        // gcloud only writes credentials into a kubeconfig file, so point it
        // at a scratch one via KUBECONFIG and read that back
        let tmp = tempfile::Builder::new()
            .prefix("kubehop-gke-")
            .tempfile()
            .map_err(|source| Error::TempFile {
                dir: std::env::temp_dir(),
                source,
            })?;
        let tmp_path = tmp.path().display().to_string();

        let mut args = vec![
            "container",
            "clusters",
            "get-credentials",
            cluster,
            "--location",
            cluster_location,
        ];
        if let Some(project) = &self.project {
            args.extend(["--project", project]);
        }
        exec::run_env("gcloud", &args, &[("KUBECONFIG", tmp_path)]).await?;

        tokio::fs::read(tmp.path())
            .await
            .map_err(|source| Error::FileRead {
                path: tmp.path().to_path_buf(),
                source,
            })
    }
}

fn ensure_gcp_credentials(id: &str, override_file: Option<&Path>) -> Result<()> {
    let found = match override_file {
        Some(file) => file.is_file(),
        None => {
            std::env::var_os("GOOGLE_APPLICATION_CREDENTIALS").is_some()
                || default_adc_path().is_some_and(|path| path.is_file())
        }
    };

    if found {
        Ok(())
    } else {
        Err(Error::construction(
            id,
            StoreKind::Gke,
            "no Google credentials found (checked the credentials file and the gcloud ADC location)",
        ))
    }
}

fn default_adc_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| {
        home.join(".config")
            .join("gcloud")
            .join("application_default_credentials.json")
    })
}

fn clusters(value: &serde_json::Value) -> Vec<(String, String)> {
    value
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let name = entry.get("name")?.as_str()?;
                    let location = entry.get("location")?.as_str()?;
                    Some((name.to_string(), location.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_location(location: &str) -> Option<(&str, &str, &str)> {
    let mut segments = location.strip_prefix("gke_")?.splitn(3, '_');
    Some((segments.next()?, segments.next()?, segments.next()?))
}
