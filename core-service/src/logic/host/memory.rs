//! In-process host adapters
//!
//! `StaticStates` holds a settable state table and fans changes out to
//! subscribers. `MemoryHistory` answers history queries from a fixed map.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use super::{HistoryEvent, HistoryMap, HistoryProvider, HostState, StateChange, StateProvider};
use crate::logic::error::HistoryError;

// ============================================================================
// STATE TABLE
// ============================================================================

struct Subscriber {
    entity_ids: Vec<String>,
    tx: mpsc::UnboundedSender<StateChange>,
}

#[derive(Default)]
pub struct StaticStates {
    states: RwLock<HashMap<String, HostState>>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl StaticStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite without notifying subscribers
    pub fn insert(&self, entity_id: &str, state: HostState) {
        self.states.write().insert(entity_id.to_string(), state);
    }

    /// Set a state and notify subscribers watching `entity_id`
    pub fn set_state(&self, entity_id: &str, value: &str, at: DateTime<Utc>) {
        let new_state = HostState::new(value, at);
        let old_state = self
            .states
            .write()
            .insert(entity_id.to_string(), new_state.clone());
        self.notify(StateChange {
            entity_id: entity_id.to_string(),
            old_state,
            new_state: Some(new_state),
        });
    }

    pub fn remove(&self, entity_id: &str) {
        let old_state = self.states.write().remove(entity_id);
        self.notify(StateChange {
            entity_id: entity_id.to_string(),
            old_state,
            new_state: None,
        });
    }

    fn notify(&self, change: StateChange) {
        let mut subscribers = self.subscribers.lock();
        // Closed receivers are pruned here
        subscribers.retain(|sub| {
            if !sub.entity_ids.iter().any(|id| id == &change.entity_id) {
                return !sub.tx.is_closed();
            }
            sub.tx.send(change.clone()).is_ok()
        });
    }
}

impl StateProvider for StaticStates {
    fn current_state(&self, entity_id: &str) -> Option<HostState> {
        self.states.read().get(entity_id).cloned()
    }

    fn subscribe(&self, entity_ids: &[String]) -> mpsc::UnboundedReceiver<StateChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(Subscriber {
            entity_ids: entity_ids.to_vec(),
            tx,
        });
        rx
    }
}

// ============================================================================
// HISTORY
// ============================================================================

#[derive(Default)]
pub struct MemoryHistory {
    events: RwLock<HistoryMap>,
    fail: RwLock<bool>,
}

impl MemoryHistory {
    pub fn new(events: HistoryMap) -> Self {
        Self {
            events: RwLock::new(events),
            fail: RwLock::new(false),
        }
    }

    pub fn push(&self, entity_id: &str, event: HistoryEvent) {
        let mut events = self.events.write();
        let list = events.entry(entity_id.to_string()).or_default();
        list.push(event);
        list.sort_by_key(|e| e.changed_at);
    }

    /// Make every query fail, for exercising degraded paths
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.fail.write() = unavailable;
    }
}

impl HistoryProvider for MemoryHistory {
    fn query_history(
        &self,
        entity_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HistoryMap, HistoryError> {
        if *self.fail.read() {
            return Err(HistoryError::Unavailable("memory history disabled".into()));
        }

        let events = self.events.read();
        let mut out = HistoryMap::new();
        for id in entity_ids {
            let Some(list) = events.get(id) else { continue };

            // Last event at or before start opens the window
            let opening = list.iter().rev().find(|e| e.changed_at <= start).cloned();
            let mut selected: Vec<HistoryEvent> = opening.into_iter().collect();
            selected.extend(
                list.iter()
                    .filter(|e| e.changed_at > start && e.changed_at <= end)
                    .cloned(),
            );
            if !selected.is_empty() {
                out.insert(id.clone(), selected);
            }
        }
        Ok(out)
    }
}
