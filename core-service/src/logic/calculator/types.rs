use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::MIN_PROBABILITY;
use crate::logic::priors::{PriorSource, PriorTriple};

/// Triple used for one sensor in one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorPrior {
    pub prob_given_true: f64,
    pub prob_given_false: f64,
    pub prior: f64,
    pub source: PriorSource,
}

impl SensorPrior {
    pub fn new(triple: PriorTriple, source: PriorSource) -> Self {
        Self {
            prob_given_true: triple.prob_given_true,
            prob_given_false: triple.prob_given_false,
            prior: triple.prior,
            source,
        }
    }
}

/// Smoothing and rate metrics derived from the coordinator's sample buffers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub moving_average: f64,
    /// Probability change per minute across the smoothing window
    pub rate_of_change: f64,
    pub occupancy_rate: f64,
    pub min_probability: f64,
    pub max_probability: f64,
    /// Seconds since the occupied flag last flipped
    pub state_duration_secs: f64,
    pub last_occupied: Option<DateTime<Utc>>,
}

/// Immutable snapshot of one calculation cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityResult {
    pub probability: f64,
    pub prior_probability: f64,
    pub active_triggers: Vec<String>,
    pub sensor_probabilities: BTreeMap<String, f64>,
    pub sensor_priors: BTreeMap<String, SensorPrior>,
    pub decay_status: BTreeMap<String, f64>,
    pub confidence_score: f64,
    pub sensor_availability: BTreeMap<String, bool>,
    pub is_occupied: bool,
    /// Decimal threshold the flag was judged against
    pub threshold: f64,
    pub calculated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<DerivedMetrics>,
}

impl ProbabilityResult {
    /// Placeholder published before priors are available
    pub fn minimal(
        sensor_availability: BTreeMap<String, bool>,
        threshold: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let configured = sensor_availability.len();
        let available = sensor_availability.values().filter(|a| **a).count();
        Self {
            probability: MIN_PROBABILITY,
            prior_probability: MIN_PROBABILITY,
            active_triggers: Vec::new(),
            sensor_probabilities: BTreeMap::new(),
            sensor_priors: BTreeMap::new(),
            decay_status: BTreeMap::from([("global_decay".to_string(), 0.0)]),
            confidence_score: confidence(available, configured),
            sensor_availability,
            is_occupied: false,
            threshold,
            calculated_at: now,
            metrics: None,
        }
    }

    pub fn global_decay(&self) -> f64 {
        self.decay_status.get("global_decay").copied().unwrap_or(0.0)
    }
}

pub fn confidence(available: usize, configured: usize) -> f64 {
    if configured == 0 {
        return 0.0;
    }
    available as f64 / configured as f64
}
