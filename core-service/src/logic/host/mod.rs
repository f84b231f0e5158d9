//! Host Integration - What the engine needs from the home-automation host
//!
//! Three narrow seams: current entity state (plus change notifications),
//! recorded history, and a key-value blob store for persistence.
//! Adapters: `StaticStates` / `MemoryHistory` (in-process) and
//! `SqliteHistory` (recorder-style SQLite table).

pub mod memory;
pub mod sqlite;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::logic::error::{HistoryError, StorageError};
use crate::logic::sensors::category::is_unavailable_state;

pub use memory::{MemoryHistory, StaticStates};
pub use sqlite::SqliteHistory;

// ============================================================================
// TYPES
// ============================================================================

/// Current state of one entity as reported by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostState {
    pub value: String,
    pub last_changed: DateTime<Utc>,
    pub available: bool,
}

impl HostState {
    pub fn new(value: impl Into<String>, last_changed: DateTime<Utc>) -> Self {
        let value = value.into();
        let available = !is_unavailable_state(&value);
        Self {
            value,
            last_changed,
            available,
        }
    }
}

/// State-change notification; `new_state: None` means the entity was removed
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub entity_id: String,
    pub old_state: Option<HostState>,
    pub new_state: Option<HostState>,
}

/// One recorded state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub state: String,
    pub changed_at: DateTime<Utc>,
}

impl HistoryEvent {
    pub fn new(state: impl Into<String>, changed_at: DateTime<Utc>) -> Self {
        Self {
            state: state.into(),
            changed_at,
        }
    }
}

/// Per-entity event lists, ascending by `changed_at`
pub type HistoryMap = HashMap<String, Vec<HistoryEvent>>;

// ============================================================================
// TRAITS
// ============================================================================

pub trait StateProvider: Send + Sync {
    fn current_state(&self, entity_id: &str) -> Option<HostState>;

    /// Change feed for `entity_ids`; the sender side is dropped on host teardown
    fn subscribe(&self, entity_ids: &[String]) -> mpsc::UnboundedReceiver<StateChange>;
}

/// Blocking history query, run off the async runtime by callers.
///
/// Implementations should include the last event at or before `start`
/// so the window opens with a known state.
pub trait HistoryProvider: Send + Sync {
    fn query_history(
        &self,
        entity_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HistoryMap, HistoryError>;
}

pub trait KeyValueStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn save(&self, key: &str, blob: &[u8]) -> Result<(), StorageError>;
}
