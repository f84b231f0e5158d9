use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::lifecycle::LifecycleState;
use crate::logic::calculator::{DecayState, ProbabilityResult};
use crate::logic::config::AreaConfig;
use crate::logic::history::{AnalysisInsights, EnvironmentalBaselines};
use crate::logic::priors::LearnedPrior;
use crate::logic::sensors::SensorObservation;

#[derive(Debug, Clone, Serialize)]
pub struct TimeslotSummary {
    pub slot_count: usize,
    pub last_updated: DateTime<Utc>,
}

/// Point-in-time dump of everything the coordinator holds
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub area_id: String,
    pub name: String,
    pub lifecycle: LifecycleState,
    pub last_update_success: bool,
    pub last_error: Option<String>,
    pub low_confidence: bool,
    pub result: Option<ProbabilityResult>,
    pub sensor_states: BTreeMap<String, SensorObservation>,
    pub motion_timestamps: BTreeMap<String, DateTime<Utc>>,
    pub learned_priors: BTreeMap<String, LearnedPrior>,
    pub decay: DecayState,
    pub probability_history: Vec<f64>,
    pub occupancy_history: Vec<bool>,
    pub last_occupied: Option<DateTime<Utc>>,
    pub last_state_change: Option<DateTime<Utc>>,
    pub timeslots: Option<TimeslotSummary>,
    pub environmental_baselines: EnvironmentalBaselines,
    pub insights: Option<AnalysisInsights>,
    pub last_analysis: Option<DateTime<Utc>>,
    pub last_save: Option<DateTime<Utc>>,
    pub config: AreaConfig,
}
