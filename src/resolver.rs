use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use kubehop_index::{Index, IndexState, SearchIndex};
use kubehop_store::{CachedStore, KubeconfigStore, StoreDefaults, new_store};
use kubehop_types::{Config, ContextMap, Error, Result, StoreConfig};

/// Where a context name points: the store that listed it and the location
/// its kubeconfig can be fetched from.
#[derive(Clone, Debug)]
pub struct ResolvedContext {
    pub store_id: String,
    pub location: String,
}

/// One store whose listing failed. The remaining stores resolve normally.
#[derive(Debug)]
pub struct StoreFailure {
    pub store_id: String,
    pub error: Error,
}

/// The unified context listing plus the live store handles needed to fetch
/// kubeconfigs afterwards.
pub struct Resolution {
    pub contexts: BTreeMap<String, ResolvedContext>,
    pub stores: HashMap<String, Arc<CachedStore>>,
    pub failures: Vec<StoreFailure>,
}

// Store handles carry no useful debug state; their ids are enough
impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut store_ids: Vec<&str> = self.stores.keys().map(String::as_str).collect();
        store_ids.sort_unstable();
        f.debug_struct("Resolution")
            .field("contexts", &self.contexts)
            .field("stores", &store_ids)
            .field("failures", &self.failures)
            .finish()
    }
}

struct ActiveStore {
    store: Arc<CachedStore>,
    refresh_index_after: Option<u64>,
}

enum StoreOutcome {
    Contexts(ContextMap),
    Failed(Error),
}

/// Resolve every configured store into one context listing.
///
/// Construction failures abort unless the store is marked non-required.
/// Listing failures never abort; they are collected per store id so the
/// caller can report them while still serving the stores that worked.
/// Index and state errors do abort: a corrupt index is never papered over.
pub async fn resolve_contexts(
    config: &Config,
    state_dir: &Path,
    no_index: bool,
) -> Result<Resolution> {
    let defaults = StoreDefaults {
        kubeconfig_name: config.kubeconfig_name.clone(),
    };

    let mut active: Vec<ActiveStore> = Vec::new();
    for store_config in &config.stores {
        match build_store(store_config, &defaults, state_dir) {
            Ok(store) => active.push(ActiveStore {
                store: Arc::new(store),
                refresh_index_after: store_config.refresh_index_after,
            }),
            Err(err) if !store_config.is_required() => {
                warn!(store = %store_config.store_id(), %err, "skipping optional store");
            }
            Err(err) => return Err(err),
        }
    }

    let outcomes = join_all(
        active
            .iter()
            .map(|entry| gather(entry, config.refresh_index_after, state_dir, no_index)),
    )
    .await;

    let mut contexts: BTreeMap<String, ResolvedContext> = BTreeMap::new();
    let mut stores: HashMap<String, Arc<CachedStore>> = HashMap::new();
    let mut failures: Vec<StoreFailure> = Vec::new();

    for (entry, outcome) in active.iter().zip(outcomes) {
        let store_id = entry.store.id().to_string();
        stores.insert(store_id.clone(), entry.store.clone());
        match outcome? {
            StoreOutcome::Contexts(listed) => {
                for (name, location) in listed {
                    insert_context(&mut contexts, &store_id, name, location);
                }
            }
            StoreOutcome::Failed(error) => {
                warn!(store = %store_id, %error, "store listing failed");
                failures.push(StoreFailure { store_id, error });
            }
        }
    }

    Ok(Resolution {
        contexts,
        stores,
        failures,
    })
}

fn build_store(
    config: &StoreConfig,
    defaults: &StoreDefaults,
    state_dir: &Path,
) -> Result<CachedStore> {
    let inner = new_store(config, defaults)?;
    CachedStore::new(inner, config.cache.as_ref(), state_dir)
}

/// Produce one store's context listing, through the persisted index when it
/// is fresh enough.
async fn gather(
    entry: &ActiveStore,
    global_refresh: Option<u64>,
    state_dir: &Path,
    no_index: bool,
) -> Result<StoreOutcome> {
    let store = entry.store.as_ref();
    let mut index = SearchIndex::new(store.kind(), state_dir, store.id())?;

    // Checked even with no_index so corrupt state files always surface
    let fresh = index.should_be_used(global_refresh, entry.refresh_index_after)?;
    if !no_index && fresh && index.has_kind(store.kind()) {
        debug!(store = store.id(), "serving contexts from the persisted index");
        return Ok(StoreOutcome::Contexts(index.content()));
    }

    let contexts = match store.list_contexts().await {
        Ok(contexts) => contexts,
        Err(err) => return Ok(StoreOutcome::Failed(err)),
    };

    // Index first, state second: a crash in between leaves a stale-looking
    // index, never a fresh-looking empty one
    let mut persisted = index.write(&Index::new(store.kind(), contexts.clone()));
    if persisted.is_ok() {
        persisted = index.write_state(&IndexState::now(store.kind()));
    }
    if let Err(err) = persisted {
        warn!(store = store.id(), %err, "failed to persist the refreshed index");
    }

    Ok(StoreOutcome::Contexts(contexts))
}

fn insert_context(
    contexts: &mut BTreeMap<String, ResolvedContext>,
    store_id: &str,
    name: String,
    location: String,
) {
    let resolved = ResolvedContext {
        store_id: store_id.to_string(),
        location,
    };
    if !contexts.contains_key(&name) {
        contexts.insert(name, resolved);
        return;
    }
    // The qualified form can itself be taken, by a context literally named
    // like it; a counter suffix keeps every listing entry
    let base = format!("{store_id}/{name}");
    let mut qualified = base.clone();
    let mut attempt = 2;
    while contexts.contains_key(&qualified) {
        qualified = format!("{base}~{attempt}");
        attempt += 1;
    }
    warn!(
        context = %name,
        store = store_id,
        "context name already taken, listing as '{qualified}'"
    );
    contexts.insert(qualified, resolved);
}
