use std::path::PathBuf;

use thiserror::Error;

use crate::StoreKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to delete {path}: {source}")]
    FileDelete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create temporary file in {dir}: {source}")]
    TempFile {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An index file exists but cannot be parsed. Never rebuilt silently;
    /// the user deletes the state files to recover.
    #[error("index file {path} is corrupt: {source}")]
    CorruptIndex {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An index state file exists but cannot be parsed.
    #[error("index state file {path} is corrupt: {source}")]
    CorruptIndexState {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot initialize {kind} store '{id}': {reason}")]
    StoreConstruction {
        id: String,
        kind: StoreKind,
        reason: String,
    },

    #[error("cannot fetch kubeconfig from {kind} store '{id}': {source}")]
    StoreFetch {
        id: String,
        kind: StoreKind,
        #[source]
        source: Box<Error>,
    },

    #[error("`{program}` could not be run: {source}")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` failed: {detail}")]
    CommandFailed { program: String, detail: String },

    #[error("`{program}` returned output that cannot be parsed: {source}")]
    CommandOutput {
        program: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot parse kubeconfig from {location}: {reason}")]
    KubeconfigParse { location: String, reason: String },

    /// The location does not follow the scheme the store's listings use.
    #[error("{kind} store cannot interpret location '{location}'")]
    InvalidLocation { kind: StoreKind, location: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("duplicate store id '{0}' in configuration")]
    DuplicateStoreId(String),

    #[error("context '{0}' not found in any configured store")]
    UnknownContext(String),
}

impl Error {
    pub fn construction(id: &str, kind: StoreKind, reason: impl Into<String>) -> Self {
        Self::StoreConstruction {
            id: id.to_string(),
            kind,
            reason: reason.into(),
        }
    }

    /// Whether this error means a persisted index or state file is corrupt.
    /// Corruption is never recovered from automatically.
    pub fn is_corrupt_state(&self) -> bool {
        matches!(self, Self::CorruptIndex { .. } | Self::CorruptIndexState { .. })
    }
}
