use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kubehop_types::{ContextMap, StoreKind};

/// Persisted body of a store's index: which contexts the store offered and
/// where each one's kubeconfig lives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub kind: StoreKind,

    #[serde(default)]
    pub contexts: ContextMap,
}

impl Index {
    pub fn new(kind: StoreKind, contexts: ContextMap) -> Self {
        Self { kind, contexts }
    }
}

/// Freshness companion of an index file. Written right after the index so
/// the pair normally agrees; a missing state file only makes the index count
/// as stale, never as invalid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexState {
    pub kind: StoreKind,

    /// UTC instant of the last successful refresh
    pub last_update_time: DateTime<Utc>,
}

impl IndexState {
    pub fn now(kind: StoreKind) -> Self {
        Self {
            kind,
            last_update_time: Utc::now(),
        }
    }
}
