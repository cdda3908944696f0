use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use kube::config::Kubeconfig;
use tracing::debug;

use kubehop_types::{ContextMap, Error, Result, StoreConfig, StoreKind};

use crate::paths::expand_path;
use crate::store::{KubeconfigStore, StoreDefaults};

/// Kubeconfigs lying around as plain files.
///
/// Configured paths may be single files, used as-is, or directories, walked
/// recursively for files whose name contains the configured kubeconfig name.
/// Locations are the file paths themselves.
#[derive(Debug)]
pub struct FilesystemStore {
    id: String,
    paths: Vec<PathBuf>,
    kubeconfig_name: String,
}

impl FilesystemStore {
    pub fn new(config: &StoreConfig, defaults: &StoreDefaults) -> Result<Self> {
        let id = config.store_id();
        if config.paths.is_empty() {
            return Err(Error::construction(
                &id,
                StoreKind::Filesystem,
                "at least one path must be configured",
            ));
        }

        let mut paths = Vec::new();
        for raw in &config.paths {
            let path = expand_path(raw);
            if !path.exists() {
                return Err(Error::construction(
                    &id,
                    StoreKind::Filesystem,
                    format!("path {} does not exist", path.display()),
                ));
            }
            paths.push(path);
        }

        Ok(Self {
            id,
            paths,
            kubeconfig_name: defaults.kubeconfig_name_for(config),
        })
    }

    /// Candidate kubeconfig files under one configured path, sorted so
    /// listing order is stable
    fn kubeconfig_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if root.is_file() {
            return Ok(vec![root.to_path_buf()]);
        }

        let mut files = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let entries = fs::read_dir(&dir).map_err(|source| Error::FileRead {
                path: dir.clone(),
                source,
            })?;
            for entry in entries {
                let entry = entry.map_err(|source| Error::FileRead {
                    path: dir.clone(),
                    source,
                })?;
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if self.is_candidate(&path) {
                    files.push(path);
                }
            }
        }
        files.sort();
        Ok(files)
    }

    fn is_candidate(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        !name.ends_with(".tmp") && name.contains(&self.kubeconfig_name)
    }
}

#[async_trait]
impl KubeconfigStore for FilesystemStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Filesystem
    }

    fn id(&self) -> &str {
        &self.id
    }

    async fn list_contexts(&self) -> Result<ContextMap> {
        let mut contexts = ContextMap::new();
        for root in &self.paths {
            for file in self.kubeconfig_files(root)? {
                match Kubeconfig::read_from(&file) {
                    Ok(kubeconfig) => {
                        let location = file.display().to_string();
                        for context in &kubeconfig.contexts {
                            // First file to declare a name keeps it
                            contexts
                                .entry(context.name.clone())
                                .or_insert_with(|| location.clone());
                        }
                    }
                    Err(err) => {
                        // Directories legitimately hold non-kubeconfig files
                        debug!(
                            file = %file.display(),
                            error = %err,
                            "skipping unparsable kubeconfig candidate"
                        );
                    }
                }
            }
        }
        Ok(contexts)
    }

    async fn get_kubeconfig(&self, location: &str) -> Result<Vec<u8>> {
        let path = Path::new(location);
        tokio::fs::read(path).await.map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })
    }
}
