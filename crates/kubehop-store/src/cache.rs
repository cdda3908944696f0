use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use kubehop_types::{CacheConfig, CacheMode, ContextMap, Error, Result, StoreKind};

use crate::paths::{expand_path, sanitize_filename};
use crate::store::KubeconfigStore;

/// Wraps a store so repeated lookups hit the backing instead of the source.
///
/// The backing mutex is held across the inner fetch, so concurrent misses
/// for the same store collapse into a single upstream call. Failures are
/// never cached; the next call retries the inner store.
pub struct CachedStore {
    inner: Box<dyn KubeconfigStore>,
    backing: Mutex<Backing>,
}

enum Backing {
    Memory(HashMap<String, Vec<u8>>),
    Filesystem(FilesystemBacking),
}

/// The two entry families a backing holds. Their keys live in disjoint
/// namespaces, so no location string can shadow the cached listing.
enum CacheKey<'a> {
    Listing,
    Kubeconfig(&'a str),
}

impl CacheKey<'_> {
    fn memory_key(&self) -> String {
        match self {
            CacheKey::Listing => "contexts".to_string(),
            CacheKey::Kubeconfig(location) => format!("kubeconfig/{location}"),
        }
    }

    fn file_name(&self) -> String {
        match self {
            CacheKey::Listing => "contexts.json".to_string(),
            CacheKey::Kubeconfig(location) => {
                format!("kubeconfig.{}", sanitize_filename(location))
            }
        }
    }
}

struct FilesystemBacking {
    dir: PathBuf,
}

impl CachedStore {
    /// No configuration means a per-process memory backing. The filesystem
    /// backing keys files per store id under `<state dir>/cache` unless the
    /// configuration points somewhere else.
    pub fn new(
        inner: Box<dyn KubeconfigStore>,
        config: Option<&CacheConfig>,
        state_dir: &Path,
    ) -> Result<Self> {
        let backing = match config.map(|c| c.kind).unwrap_or_default() {
            CacheMode::Memory => Backing::Memory(HashMap::new()),
            CacheMode::Filesystem => {
                let base = match config.and_then(|c| c.path.as_ref()) {
                    Some(path) => expand_path(&path.to_string_lossy()),
                    None => state_dir.join("cache"),
                };
                let dir = base.join(sanitize_filename(inner.id()));
                std::fs::create_dir_all(&dir).map_err(|err| Error::DirectoryCreate {
                    path: dir.clone(),
                    source: err,
                })?;
                Backing::Filesystem(FilesystemBacking { dir })
            }
        };

        Ok(Self {
            inner,
            backing: Mutex::new(backing),
        })
    }

    /// Drops everything cached for this store. Filesystem entries are
    /// removed from disk as well, so the next run starts cold.
    pub async fn clear(&self) -> Result<()> {
        let mut backing = self.backing.lock().await;
        match &mut *backing {
            Backing::Memory(entries) => entries.clear(),
            Backing::Filesystem(fs) => {
                if let Err(err) = std::fs::remove_dir_all(&fs.dir) {
                    if err.kind() != std::io::ErrorKind::NotFound {
                        return Err(Error::FileDelete {
                            path: fs.dir.clone(),
                            source: err,
                        });
                    }
                }
                std::fs::create_dir_all(&fs.dir).map_err(|err| Error::DirectoryCreate {
                    path: fs.dir.clone(),
                    source: err,
                })?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl KubeconfigStore for CachedStore {
    fn kind(&self) -> StoreKind {
        self.inner.kind()
    }

    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn list_contexts(&self) -> Result<ContextMap> {
        let mut backing = self.backing.lock().await;

        if let Some(bytes) = backing.get(self.inner.id(), &CacheKey::Listing) {
            match serde_json::from_slice::<ContextMap>(&bytes) {
                Ok(contexts) => return Ok(contexts),
                Err(err) => {
                    debug!(store = self.inner.id(), %err, "discarding unreadable cached context listing");
                }
            }
        }

        let contexts = self.inner.list_contexts().await?;
        match serde_json::to_vec(&contexts) {
            Ok(bytes) => backing.put(self.inner.id(), &CacheKey::Listing, &bytes),
            Err(err) => {
                warn!(store = self.inner.id(), %err, "failed to encode context listing for the cache");
            }
        }
        Ok(contexts)
    }

    async fn get_kubeconfig(&self, location: &str) -> Result<Vec<u8>> {
        let mut backing = self.backing.lock().await;

        let key = CacheKey::Kubeconfig(location);
        if let Some(bytes) = backing.get(self.inner.id(), &key) {
            return Ok(bytes);
        }

        let bytes = self.inner.get_kubeconfig(location).await?;
        backing.put(self.inner.id(), &key, &bytes);
        Ok(bytes)
    }
}

impl Backing {
    fn get(&self, store_id: &str, key: &CacheKey<'_>) -> Option<Vec<u8>> {
        match self {
            Backing::Memory(entries) => entries.get(&key.memory_key()).cloned(),
            Backing::Filesystem(fs) => {
                let path = fs.dir.join(key.file_name());
                match std::fs::read(&path) {
                    Ok(bytes) => Some(bytes),
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
                    Err(err) => {
                        warn!(store = store_id, path = %path.display(), %err, "cache read failed, treating as miss");
                        None
                    }
                }
            }
        }
    }

    // Best effort: a cache that cannot persist only costs a refetch
    fn put(&mut self, store_id: &str, key: &CacheKey<'_>, bytes: &[u8]) {
        match self {
            Backing::Memory(entries) => {
                entries.insert(key.memory_key(), bytes.to_vec());
            }
            Backing::Filesystem(fs) => {
                let path = fs.dir.join(key.file_name());
                if let Err(err) = std::fs::write(&path, bytes) {
                    warn!(store = store_id, path = %path.display(), %err, "cache write failed");
                }
            }
        }
    }
}
