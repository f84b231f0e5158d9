use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{
    OCCUPANCY_HISTORY_LEN, PROBABILITY_HISTORY_LEN, STORAGE_VERSION, STORAGE_VERSION_MINOR,
};
use crate::logic::calculator::clamp_probability;
use crate::logic::error::StorageError;
use crate::logic::priors::LearnedPrior;

// ============================================================================
// VERSIONED STATE (v2.1)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    pub version_minor: u32,
    pub probability_history: Vec<f64>,
    pub occupancy_history: Vec<bool>,
    pub last_occupied: Option<DateTime<Utc>>,
    pub last_state_change: Option<DateTime<Utc>>,
    pub learned_priors: BTreeMap<String, LearnedPrior>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STORAGE_VERSION,
            version_minor: STORAGE_VERSION_MINOR,
            probability_history: Vec::new(),
            occupancy_history: Vec::new(),
            last_occupied: None,
            last_state_change: None,
            learned_priors: BTreeMap::new(),
        }
    }
}

impl PersistedState {
    /// Lenient decode of an already-migrated document. Bad history samples
    /// and malformed prior records are dropped one by one.
    pub fn from_value(value: Value) -> Result<Self, StorageError> {
        let Value::Object(obj) = value else {
            return Err(StorageError::InvalidFormat("root is not an object".into()));
        };

        let probability_history = newest(
            array(&obj, "probability_history")
                .filter_map(Value::as_f64)
                .filter(|p| p.is_finite())
                .map(clamp_probability)
                .collect(),
            PROBABILITY_HISTORY_LEN,
        );
        let occupancy_history = newest(
            array(&obj, "occupancy_history")
                .filter_map(Value::as_bool)
                .collect(),
            OCCUPANCY_HISTORY_LEN,
        );

        let mut learned_priors = BTreeMap::new();
        if let Some(Value::Object(records)) = obj.get("learned_priors") {
            for (entity_id, record) in records {
                match parse_prior(entity_id, record) {
                    Some(prior) => {
                        learned_priors.insert(entity_id.clone(), prior);
                    }
                    None => log::warn!("Discarding malformed stored prior for {}", entity_id),
                }
            }
        }

        Ok(Self {
            version: STORAGE_VERSION,
            version_minor: STORAGE_VERSION_MINOR,
            probability_history,
            occupancy_history,
            last_occupied: timestamp(&obj, "last_occupied"),
            last_state_change: timestamp(&obj, "last_state_change"),
            learned_priors,
        })
    }
}

fn array<'a>(obj: &'a Map<String, Value>, key: &str) -> impl Iterator<Item = &'a Value> {
    obj.get(key)
        .and_then(Value::as_array)
        .map(|a| a.iter())
        .into_iter()
        .flatten()
}

fn newest<T>(mut samples: Vec<T>, capacity: usize) -> Vec<T> {
    if samples.len() > capacity {
        samples.drain(..samples.len() - capacity);
    }
    samples
}

fn timestamp(obj: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    obj.get(key)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
}

fn parse_prior(entity_id: &str, record: &Value) -> Option<LearnedPrior> {
    let mut record = record.as_object()?.clone();
    record
        .entry("entity_id")
        .or_insert_with(|| Value::String(entity_id.to_string()));
    let prior: LearnedPrior = serde_json::from_value(Value::Object(record)).ok()?;
    if prior.entity_id != entity_id {
        return None;
    }
    prior.sanitized()
}
