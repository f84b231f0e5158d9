//! Sensor State Store - last known observation per configured entity

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::{is_unavailable_state, SensorCategory, STATE_ON};
use crate::logic::host::HostState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorObservation {
    pub entity_id: String,
    pub raw_state: String,
    pub last_changed: DateTime<Utc>,
    pub available: bool,
}

impl SensorObservation {
    /// Map host state to an observation; a missing entity is unavailable
    pub fn from_host(entity_id: &str, state: Option<&HostState>, now: DateTime<Utc>) -> Self {
        match state {
            Some(state) => Self {
                entity_id: entity_id.to_string(),
                raw_state: state.value.clone(),
                last_changed: state.last_changed,
                available: state.available && !is_unavailable_state(&state.value),
            },
            None => Self {
                entity_id: entity_id.to_string(),
                raw_state: String::new(),
                last_changed: now,
                available: false,
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SensorStateStore {
    observations: HashMap<String, SensorObservation>,
    motion_timestamps: HashMap<String, DateTime<Utc>>,
}

impl SensorStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation. Motion turning on stamps `now` as its last
    /// activation. Returns whether anything the calculator reads changed.
    pub fn apply(
        &mut self,
        observation: SensorObservation,
        category: SensorCategory,
        now: DateTime<Utc>,
    ) -> bool {
        if category == SensorCategory::Motion
            && observation.available
            && observation.raw_state.eq_ignore_ascii_case(STATE_ON)
        {
            self.motion_timestamps
                .insert(observation.entity_id.clone(), now);
        }

        let changed = match self.observations.get(&observation.entity_id) {
            Some(prev) => prev.raw_state != observation.raw_state || prev.available != observation.available,
            None => true,
        };
        self.observations
            .insert(observation.entity_id.clone(), observation);
        changed
    }

    /// Drop entities that are no longer configured
    pub fn retain(&mut self, configured: &HashSet<String>) {
        self.observations.retain(|id, _| configured.contains(id));
        self.motion_timestamps.retain(|id, _| configured.contains(id));
    }

    pub fn get(&self, entity_id: &str) -> Option<&SensorObservation> {
        self.observations.get(entity_id)
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.observations.contains_key(entity_id)
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn snapshot(&self) -> BTreeMap<String, SensorObservation> {
        self.observations
            .iter()
            .map(|(id, o)| (id.clone(), o.clone()))
            .collect()
    }

    pub fn motion_timestamps(&self) -> &HashMap<String, DateTime<Utc>> {
        &self.motion_timestamps
    }
}
