use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use kubehop_store::expand_path;
use kubehop_types::{Config, Error, Result, StoreConfig, StoreKind};

/// Store id of the implicit filesystem store fed by `--kubeconfig-path` and
/// `$KUBECONFIG`. Never merged into a configured store.
pub const FLAG_ENV_STORE_ID: &str = "env-and-flag";

pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".kube").join("kubehop.toml"))
}

pub fn default_state_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".kube").join("kubehop-state"))
}

/// Read and validate the configuration file. A missing file is a first run,
/// not an error; resolution later complains if no store results at all.
pub fn load_config(path: &Path) -> Result<Config> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no configuration file, starting empty");
            return Ok(Config::default());
        }
        Err(source) => {
            return Err(Error::FileRead {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let config: Config = toml::from_str(&raw)
        .map_err(|err| Error::Config(format!("{}: {err}", path.display())))?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let mut seen = HashSet::new();
    for store in &config.stores {
        let id = store.store_id();
        if !seen.insert(id.clone()) {
            return Err(Error::DuplicateStoreId(id));
        }
        match store.kind {
            StoreKind::Filesystem | StoreKind::Vault => {
                if store.paths.is_empty() {
                    return Err(Error::Config(format!(
                        "store '{id}' needs at least one entry in `paths`"
                    )));
                }
            }
            StoreKind::Eks | StoreKind::Gke | StoreKind::Aks => {}
        }
    }
    Ok(())
}

/// Fold `--kubeconfig-path` and `$KUBECONFIG` into the configuration as one
/// extra non-required filesystem store.
///
/// Both values split on `:` like the variable itself. A candidate path is
/// dropped when it ends in `.tmp` (kubectl leaves those behind), does not
/// exist, or is already covered by a configured store. With no stores left
/// after merging there is nothing to resolve, which is a config error.
pub fn merge_kubeconfig_sources(
    config: &mut Config,
    flag_path: Option<&str>,
    kubeconfig_env: Option<&str>,
) -> Result<()> {
    let configured: Vec<PathBuf> = config
        .stores
        .iter()
        .flat_map(|store| store.paths.iter())
        .map(|path| expand_path(path))
        .collect();

    let mut extra: Vec<String> = Vec::new();
    let mut extra_expanded: Vec<PathBuf> = Vec::new();
    for raw in flag_path.into_iter().chain(kubeconfig_env) {
        for candidate in raw.split(':').filter(|part| !part.is_empty()) {
            if candidate.ends_with(".tmp") {
                debug!(path = candidate, "skipping temporary kubeconfig path");
                continue;
            }
            let expanded = expand_path(candidate);
            if !expanded.exists() {
                warn!(path = candidate, "skipping kubeconfig path that does not exist");
                continue;
            }
            if configured.contains(&expanded) || extra_expanded.contains(&expanded) {
                debug!(path = candidate, "kubeconfig path already covered by a store");
                continue;
            }
            extra.push(candidate.to_string());
            extra_expanded.push(expanded);
        }
    }

    if !extra.is_empty() {
        if config
            .stores
            .iter()
            .any(|store| store.store_id() == FLAG_ENV_STORE_ID)
        {
            warn!(
                "a store already uses the id '{FLAG_ENV_STORE_ID}', ignoring --kubeconfig-path and $KUBECONFIG"
            );
        } else {
            let mut store = StoreConfig::new(StoreKind::Filesystem);
            store.id = Some(FLAG_ENV_STORE_ID.to_string());
            store.required = Some(false);
            store.paths = extra;
            config.stores.push(store);
        }
    }

    if config.stores.is_empty() {
        return Err(Error::Config(
            "no kubeconfig stores configured; add a [[stores]] entry to the config file, \
             pass --kubeconfig-path, or set $KUBECONFIG"
                .to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("kubehop.toml");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_missing_config_file_is_empty_config() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert!(config.stores.is_empty());
        assert!(config.refresh_index_after.is_none());
    }

    #[test]
    fn test_config_file_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
            refresh_index_after = 3600

            [[stores]]
            kind = "filesystem"
            id = "work"
            paths = ["~/.kube/work"]

            [[stores]]
            kind = "vault"
            paths = ["kubeconfigs/prod"]
            refresh_index_after = 60

            [stores.vault]
            address = "https://vault.example.com"
            "#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.refresh_index_after, Some(3600));
        assert_eq!(config.stores.len(), 2);
        assert_eq!(config.stores[0].store_id(), "work");
        assert_eq!(config.stores[1].store_id(), "vault");
        assert_eq!(config.stores[1].refresh_index_after, Some(60));
        assert_eq!(
            config.stores[1].vault.as_ref().unwrap().address.as_deref(),
            Some("https://vault.example.com")
        );
    }

    #[test]
    fn test_unparsable_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "stores = [[[");
        assert!(matches!(load_config(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_duplicate_store_ids_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
            [[stores]]
            kind = "filesystem"
            paths = ["/a"]

            [[stores]]
            kind = "filesystem"
            paths = ["/b"]
            "#,
        );

        // Both default their id to "filesystem"
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, Error::DuplicateStoreId(id) if id == "filesystem"));
    }

    #[test]
    fn test_vault_store_requires_paths() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
            [[stores]]
            kind = "vault"
            "#,
        );
        assert!(matches!(load_config(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_merge_appends_non_required_store() {
        let dir = TempDir::new().unwrap();
        let kubeconfig = dir.path().join("config");
        fs::write(&kubeconfig, "apiVersion: v1").unwrap();

        let mut config = Config::default();
        merge_kubeconfig_sources(&mut config, Some(kubeconfig.to_str().unwrap()), None).unwrap();

        assert_eq!(config.stores.len(), 1);
        let store = &config.stores[0];
        assert_eq!(store.store_id(), FLAG_ENV_STORE_ID);
        assert_eq!(store.kind, StoreKind::Filesystem);
        assert!(!store.is_required());
        assert_eq!(store.paths, vec![kubeconfig.to_str().unwrap().to_string()]);
    }

    #[test]
    fn test_merge_skips_temporary_missing_and_duplicate_paths() {
        let dir = TempDir::new().unwrap();
        let known = dir.path().join("known");
        let fresh = dir.path().join("fresh");
        fs::write(&known, "apiVersion: v1").unwrap();
        fs::write(&fresh, "apiVersion: v1").unwrap();

        let mut config = Config::default();
        let mut store = StoreConfig::new(StoreKind::Filesystem);
        store.paths = vec![known.to_str().unwrap().to_string()];
        config.stores.push(store);

        let env = format!(
            "{known}:{fresh}:{fresh}:{missing}:{tmp}",
            known = known.display(),
            fresh = fresh.display(),
            missing = dir.path().join("missing").display(),
            tmp = dir.path().join("half-written.tmp").display(),
        );
        merge_kubeconfig_sources(&mut config, None, Some(&env)).unwrap();

        assert_eq!(config.stores.len(), 2);
        assert_eq!(
            config.stores[1].paths,
            vec![fresh.to_str().unwrap().to_string()]
        );
    }

    #[test]
    fn test_merge_without_any_store_is_an_error() {
        let mut config = Config::default();
        let err = merge_kubeconfig_sources(&mut config, None, None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_merge_with_only_dead_candidates_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        let env = format!("{}", dir.path().join("gone").display());
        assert!(merge_kubeconfig_sources(&mut config, None, Some(&env)).is_err());
    }
}
