use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;

use kubehop_types::{ContextMap, Error, Result, StoreKind};

use crate::model::{Index, IndexState};

/// A store's persisted index plus its staleness bookkeeping.
///
/// File layout under the state directory: `switch.<store id>.index` holds
/// the context mapping, `switch.<store id>.index.state` holds the refresh
/// timestamp. Both are pretty-printed JSON so they stay inspectable with a
/// pager when something looks off.
#[derive(Debug)]
pub struct SearchIndex {
    kind: StoreKind,
    index_path: PathBuf,
    state_path: PathBuf,
    index: Option<Index>,
}

impl SearchIndex {
    /// Open the index for one store, creating the state directory and
    /// loading any previously written content. A corrupt index file is an
    /// error; an absent one just means there is nothing to serve yet.
    pub fn new(kind: StoreKind, state_dir: &Path, store_id: &str) -> Result<Self> {
        fs::create_dir_all(state_dir).map_err(|source| Error::DirectoryCreate {
            path: state_dir.to_path_buf(),
            source,
        })?;

        let index_path = state_dir.join(format!("switch.{store_id}.index"));
        let state_path = state_dir.join(format!("switch.{store_id}.index.state"));
        let index = load_index(&index_path)?;

        Ok(Self {
            kind,
            index_path,
            state_path,
            index,
        })
    }

    /// Whether any index content was loaded
    pub fn has_content(&self) -> bool {
        self.index.is_some()
    }

    /// Whether the loaded content was written by a store of the given kind
    pub fn has_kind(&self, kind: StoreKind) -> bool {
        self.index.as_ref().is_some_and(|index| index.kind == kind)
    }

    /// The loaded context mapping; empty when nothing was loaded
    pub fn content(&self) -> ContextMap {
        self.index
            .as_ref()
            .map(|index| index.contexts.clone())
            .unwrap_or_default()
    }

    /// Decide whether the persisted index is fresh enough to serve.
    ///
    /// The store's own refresh interval wins over the global one. Without
    /// any interval, or without a state file, the answer is no and the
    /// caller queries the store. A state file written by a different store
    /// kind is treated the same way. Only an unreadable state file is an
    /// error.
    pub fn should_be_used(
        &self,
        global_refresh_seconds: Option<u64>,
        store_refresh_seconds: Option<u64>,
    ) -> Result<bool> {
        let Some(state) = load_state(&self.state_path)? else {
            return Ok(false);
        };
        if state.kind != self.kind {
            debug!(
                expected = %self.kind,
                found = %state.kind,
                "index state belongs to another store kind"
            );
            return Ok(false);
        }
        let Some(seconds) = store_refresh_seconds.or(global_refresh_seconds) else {
            return Ok(false);
        };

        let ttl = i64::try_from(seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);

        // Fresh strictly before last_update_time + ttl
        let elapsed = Utc::now().signed_duration_since(state.last_update_time);
        Ok(elapsed < ttl)
    }

    /// Replace the persisted context mapping. The file is written to a
    /// temporary sibling and renamed into place, so a reader never observes
    /// a half-written index.
    pub fn write(&mut self, index: &Index) -> Result<()> {
        write_json(&self.index_path, index)?;
        debug!(
            path = %self.index_path.display(),
            contexts = index.contexts.len(),
            "wrote index"
        );
        self.index = Some(index.clone());
        Ok(())
    }

    /// Record a refresh instant. Callers write the index first and the
    /// state second; losing the state file to a crash in between makes the
    /// next resolution treat the index as stale, nothing worse.
    pub fn write_state(&self, state: &IndexState) -> Result<()> {
        write_json(&self.state_path, state)
    }

    /// Remove both files. Absent files are fine, deleting twice is fine.
    pub fn delete(&mut self) -> Result<()> {
        remove_if_exists(&self.state_path)?;
        remove_if_exists(&self.index_path)?;
        self.index = None;
        Ok(())
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }
}

fn load_index(path: &Path) -> Result<Option<Index>> {
    let Some(content) = read_if_exists(path)? else {
        return Ok(None);
    };
    let index = serde_json::from_str(&content).map_err(|source| Error::CorruptIndex {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(index))
}

fn load_state(path: &Path) -> Result<Option<IndexState>> {
    let Some(content) = read_if_exists(path)? else {
        return Ok(None);
    };
    let state = serde_json::from_str(&content).map_err(|source| Error::CorruptIndexState {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(state))
}

fn read_if_exists(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(Error::FileRead {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).map_err(|source| Error::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|source| Error::TempFile {
        dir: dir.to_path_buf(),
        source,
    })?;
    tmp.write_all(content.as_bytes())
        .map_err(|source| Error::FileWrite {
            path: path.to_path_buf(),
            source,
        })?;
    tmp.persist(path).map_err(|source| Error::FileWrite {
        path: path.to_path_buf(),
        source: source.error,
    })?;
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(Error::FileDelete {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_contexts() -> ContextMap {
        let mut contexts = ContextMap::new();
        contexts.insert("dev-eu".to_string(), "/kubeconfigs/dev-eu/config".to_string());
        contexts.insert("prod-us".to_string(), "/kubeconfigs/prod-us/config".to_string());
        contexts
    }

    fn open(dir: &TempDir, kind: StoreKind) -> SearchIndex {
        SearchIndex::new(kind, dir.path(), "test-store").unwrap()
    }

    fn write_state_aged(index: &SearchIndex, kind: StoreKind, age: Duration) {
        let state = IndexState {
            kind,
            last_update_time: Utc::now() - age,
        };
        index.write_state(&state).unwrap();
    }

    #[test]
    fn test_new_creates_state_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("state").join("indexes");

        SearchIndex::new(StoreKind::Filesystem, &nested, "fs").unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_absent_index_has_no_content() {
        let dir = TempDir::new().unwrap();
        let index = open(&dir, StoreKind::Filesystem);

        assert!(!index.has_content());
        assert!(!index.has_kind(StoreKind::Filesystem));
        assert!(index.content().is_empty());
    }

    #[test]
    fn test_write_then_reopen_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut index = open(&dir, StoreKind::Filesystem);
        index
            .write(&Index::new(StoreKind::Filesystem, sample_contexts()))
            .unwrap();

        let reopened = open(&dir, StoreKind::Filesystem);
        assert!(reopened.has_content());
        assert!(reopened.has_kind(StoreKind::Filesystem));
        assert!(!reopened.has_kind(StoreKind::Vault));
        assert_eq!(reopened.content(), sample_contexts());
    }

    #[test]
    fn test_written_files_are_inspectable_json() {
        let dir = TempDir::new().unwrap();
        let mut index = open(&dir, StoreKind::Filesystem);
        index
            .write(&Index::new(StoreKind::Filesystem, sample_contexts()))
            .unwrap();
        index.write_state(&IndexState::now(StoreKind::Filesystem)).unwrap();

        let raw = fs::read_to_string(index.index_path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["kind"], "filesystem");
        assert!(value["contexts"].is_object());

        let raw = fs::read_to_string(index.state_path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value["last_update_time"].is_string());
    }

    #[test]
    fn test_should_be_used_without_state_file_is_false() {
        let dir = TempDir::new().unwrap();
        let index = open(&dir, StoreKind::Filesystem);

        assert!(!index.should_be_used(Some(3600), None).unwrap());
    }

    #[test]
    fn test_fresh_state_within_interval() {
        let dir = TempDir::new().unwrap();
        let index = open(&dir, StoreKind::Filesystem);
        write_state_aged(&index, StoreKind::Filesystem, Duration::zero());

        assert!(index.should_be_used(Some(3600), None).unwrap());
    }

    #[test]
    fn test_stale_state_past_interval() {
        let dir = TempDir::new().unwrap();
        let index = open(&dir, StoreKind::Filesystem);
        write_state_aged(&index, StoreKind::Filesystem, Duration::hours(2));

        assert!(!index.should_be_used(Some(3600), None).unwrap());
    }

    #[test]
    fn test_shrinking_interval_never_unstales() {
        let dir = TempDir::new().unwrap();
        let index = open(&dir, StoreKind::Filesystem);
        write_state_aged(&index, StoreKind::Filesystem, Duration::minutes(30));

        assert!(index.should_be_used(Some(3600), None).unwrap());
        assert!(!index.should_be_used(Some(60), None).unwrap());
    }

    #[test]
    fn test_store_interval_overrides_global() {
        let dir = TempDir::new().unwrap();
        let index = open(&dir, StoreKind::Filesystem);
        write_state_aged(&index, StoreKind::Filesystem, Duration::hours(2));

        // Fresh by the global interval, stale by the store's own
        assert!(!index.should_be_used(Some(3 * 3600), Some(3600)).unwrap());
        // Stale by the global interval, fresh by the store's own
        assert!(index.should_be_used(Some(3600), Some(3 * 3600)).unwrap());
    }

    #[test]
    fn test_no_interval_means_refresh() {
        let dir = TempDir::new().unwrap();
        let index = open(&dir, StoreKind::Filesystem);
        write_state_aged(&index, StoreKind::Filesystem, Duration::zero());

        assert!(!index.should_be_used(None, None).unwrap());
    }

    #[test]
    fn test_state_of_another_kind_is_stale() {
        let dir = TempDir::new().unwrap();
        let index = open(&dir, StoreKind::Filesystem);
        write_state_aged(&index, StoreKind::Vault, Duration::zero());

        assert!(!index.should_be_used(Some(3600), None).unwrap());
    }

    #[test]
    fn test_corrupt_index_file_fails_open() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("switch.test-store.index"), "{ not json").unwrap();

        let err = SearchIndex::new(StoreKind::Filesystem, dir.path(), "test-store").unwrap_err();
        assert!(err.is_corrupt_state());
    }

    #[test]
    fn test_corrupt_state_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let index = open(&dir, StoreKind::Filesystem);
        fs::write(index.state_path(), "kind: ???").unwrap();

        let err = index.should_be_used(Some(3600), None).unwrap_err();
        assert!(err.is_corrupt_state());
    }

    #[test]
    fn test_delete_removes_both_files_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut index = open(&dir, StoreKind::Filesystem);
        index
            .write(&Index::new(StoreKind::Filesystem, sample_contexts()))
            .unwrap();
        index.write_state(&IndexState::now(StoreKind::Filesystem)).unwrap();
        assert!(index.index_path().exists());
        assert!(index.state_path().exists());

        index.delete().unwrap();
        assert!(!index.index_path().exists());
        assert!(!index.state_path().exists());
        assert!(!index.has_content());

        index.delete().unwrap();
    }
}
