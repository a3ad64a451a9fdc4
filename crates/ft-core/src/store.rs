//! Key-value storage seam for the persisted session record.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use thiserror::Error;

use crate::state::{SessionState, StateKey, StatePatch};

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store failed.
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A stored value had the wrong shape.
    #[error("invalid stored value: {0}")]
    Decode(#[from] serde_json::Error),

    /// A lock guarding in-memory state was poisoned.
    #[error("storage lock poisoned")]
    Poisoned,
}

impl<T> From<PoisonError<T>> for StoreError {
    fn from(_: PoisonError<T>) -> Self {
        Self::Poisoned
    }
}

/// A flat key-value store holding the session record.
///
/// `get` returns only the requested keys that are present; `set` merges a
/// partial record. Implementations need no transactions across calls: the
/// controller and the UI always re-read before writing.
pub trait Store {
    fn get(&self, keys: &[StateKey]) -> Result<StatePatch, StoreError>;

    fn set(&self, patch: &StatePatch) -> Result<(), StoreError>;
}

impl<T: Store + ?Sized> Store for Arc<T> {
    fn get(&self, keys: &[StateKey]) -> Result<StatePatch, StoreError> {
        (**self).get(keys)
    }

    fn set(&self, patch: &StatePatch) -> Result<(), StoreError> {
        (**self).set(patch)
    }
}

impl<T: Store + ?Sized> Store for &T {
    fn get(&self, keys: &[StateKey]) -> Result<StatePatch, StoreError> {
        (**self).get(keys)
    }

    fn set(&self, patch: &StatePatch) -> Result<(), StoreError> {
        (**self).set(patch)
    }
}

/// Reads the whole record, with defaults for anything absent.
pub fn load_state<S: Store + ?Sized>(store: &S) -> Result<SessionState, StoreError> {
    let patch = store.get(&StateKey::ALL)?;
    Ok(SessionState::from_patch(&patch))
}

/// In-memory store used by tests and embedding front ends.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.values.lock().map_or(0, |values| values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn get(&self, keys: &[StateKey]) -> Result<StatePatch, StoreError> {
        let values = self.values.lock()?;
        let selected: HashMap<String, Value> = keys
            .iter()
            .filter_map(|key| {
                values
                    .get(key.as_str())
                    .map(|value| (key.as_str().to_string(), value.clone()))
            })
            .collect();
        Ok(StatePatch::from_entries(&selected)?)
    }

    fn set(&self, patch: &StatePatch) -> Result<(), StoreError> {
        let mut values = self.values.lock()?;
        for (key, value) in patch.to_entries() {
            values.insert(key.as_str().to_string(), value);
        }
        Ok(())
    }
}
