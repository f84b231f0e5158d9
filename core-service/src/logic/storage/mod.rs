//! Persistence - versioned area state behind a key-value store

pub mod backend;
pub mod migrate;
pub mod types;


use std::sync::Arc;

use crate::logic::error::StorageError;
use crate::logic::host::KeyValueStore;

pub use backend::{JsonFileStore, MemoryStore};
pub use types::PersistedState;

#[derive(Clone)]
pub struct AreaStorage {
    backend: Arc<dyn KeyValueStore>,
    key: String,
}

impl AreaStorage {
    pub fn new(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn try_load(&self) -> Result<Option<PersistedState>, StorageError> {
        let Some(blob) = self.backend.load(&self.key)? else {
            return Ok(None);
        };
        let raw: serde_json::Value = serde_json::from_slice(&blob)?;
        let migrated = migrate::migrate(raw)?;
        PersistedState::from_value(migrated).map(Some)
    }

    /// Load and migrate; anything unreadable starts from empty state
    pub fn load(&self) -> Option<PersistedState> {
        match self.try_load() {
            Ok(state) => state,
            Err(e) => {
                log::warn!("Stored state for {} unusable, starting fresh: {}", self.key, e);
                None
            }
        }
    }

    pub fn save(&self, state: &PersistedState) -> Result<(), StorageError> {
        let blob = serde_json::to_vec_pretty(state)?;
        self.backend.save(&self.key, &blob)
    }
}
