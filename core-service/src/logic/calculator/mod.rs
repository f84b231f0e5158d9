//! Probability Calculator - Bayesian inference over live sensor states
//!
//! Stateless: borrows a snapshot of the area, returns a new result plus the
//! decay state and prior feedback for the coordinator to apply.

pub mod bayes;
pub mod decay;
pub mod types;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::constants::DEFAULT_PRIOR;
use crate::logic::config::{AreaConfig, CategoryWeights, SensorSet};
use crate::logic::error::CalculationError;
use crate::logic::history::{EnvironmentalBaselines, TimeslotEntry};
use crate::logic::model::OccupancyThreshold;
use crate::logic::priors::{LearnedPrior, PriorSource, PriorStore, PriorTriple};
use crate::logic::sensors::{SensorCategory, SensorStateStore};

pub use bayes::{clamp_probability, update_probability, weighted_likelihood};
pub use decay::{DecayOutcome, DecayState};
pub use types::{DerivedMetrics, ProbabilityResult, SensorPrior};

/// Borrowed view of everything one cycle reads
pub struct CalculationInput<'a> {
    pub states: &'a SensorStateStore,
    pub priors: &'a PriorStore,
    /// Entry for the current bucket, only once the cache is trusted
    pub timeslot: Option<&'a TimeslotEntry>,
    pub baselines: &'a EnvironmentalBaselines,
    pub decay: &'a DecayState,
    pub previous_probability: Option<f64>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Calculation {
    pub result: ProbabilityResult,
    pub decay: DecayState,
    /// Online feedback for the prior store
    pub prior_updates: Vec<LearnedPrior>,
}

pub struct ProbabilityCalculator<'a> {
    sensors: &'a SensorSet,
    weights: &'a CategoryWeights,
    threshold: OccupancyThreshold,
}

impl<'a> ProbabilityCalculator<'a> {
    pub fn new(config: &'a AreaConfig) -> Self {
        Self {
            sensors: &config.sensors,
            weights: &config.weights,
            threshold: config.threshold,
        }
    }

    pub fn calculate(&self, input: CalculationInput<'_>) -> Result<Calculation, CalculationError> {
        let threshold = self.threshold.decimal()?;
        let previous = match input.previous_probability {
            Some(p) if !p.is_finite() => return Err(CalculationError::InvalidPrevious(p)),
            Some(p) => clamp_probability(p),
            None => DEFAULT_PRIOR,
        };

        let mut running = previous;
        let mut active_triggers = Vec::new();
        let mut sensor_probabilities = BTreeMap::new();
        let mut sensor_priors = BTreeMap::new();
        let mut sensor_availability = BTreeMap::new();
        let mut prior_updates = Vec::new();
        let mut prior_sum = 0.0;

        for (entity_id, category) in self.sensors.iter() {
            let observation = input.states.get(entity_id).filter(|o| o.available);
            sensor_availability.insert(entity_id.to_string(), observation.is_some());
            let Some(observation) = observation else { continue };

            let (triple, source) = self.resolve(entity_id, category, input.priors, input.timeslot);
            prior_sum += triple.prior;

            if category.is_active(&observation.raw_state, input.baselines.get(entity_id)) {
                let p_true = weighted_likelihood(
                    triple.prob_given_true,
                    triple.prob_given_false,
                    self.weights.get(category),
                );
                running = update_probability(running, p_true, triple.prob_given_false);
                active_triggers.push(entity_id.to_string());
            }
            sensor_probabilities.insert(entity_id.to_string(), running);
            sensor_priors.insert(entity_id.to_string(), SensorPrior::new(triple, source));

            prior_updates.push(match input.priors.learned(entity_id) {
                Some(learned) => learned.clone(),
                None => LearnedPrior::new(entity_id, triple, source, input.now),
            });
        }

        let available = sensor_priors.len();
        let (probability, decay, factor) = if active_triggers.is_empty() {
            let DecayOutcome { probability, factor } = input.decay.apply(running, input.now);
            (probability, input.decay.clone(), factor)
        } else {
            (running, input.decay.triggered(input.now, running), 1.0)
        };
        let probability = clamp_probability(probability);

        // No evidence at all never reads as occupied
        let is_occupied = available > 0 && self.threshold.is_occupied(probability)?;

        let prior_probability = if available > 0 {
            clamp_probability(prior_sum / available as f64)
        } else {
            DEFAULT_PRIOR
        };

        let result = ProbabilityResult {
            probability,
            prior_probability,
            active_triggers,
            sensor_probabilities,
            sensor_priors,
            decay_status: BTreeMap::from([("global_decay".to_string(), 1.0 - factor)]),
            confidence_score: types::confidence(available, self.sensors.len()),
            sensor_availability,
            is_occupied,
            threshold,
            calculated_at: input.now,
            metrics: None,
        };

        Ok(Calculation {
            result,
            decay,
            prior_updates,
        })
    }

    /// Learned prior, then timeslot likelihoods, then category defaults
    fn resolve(
        &self,
        entity_id: &str,
        category: SensorCategory,
        priors: &PriorStore,
        timeslot: Option<&TimeslotEntry>,
    ) -> (PriorTriple, PriorSource) {
        if let Some(learned) = priors.learned(entity_id) {
            return (learned.triple(), PriorSource::History);
        }

        let defaults = category.defaults();
        if let Some(slot) = timeslot.and_then(|t| t.entity(entity_id)) {
            let prior = priors.get(entity_id).map(|p| p.prior).unwrap_or(defaults.prior);
            return (
                PriorTriple::new(slot.prob_given_true, slot.prob_given_false, prior),
                PriorSource::Timeslot,
            );
        }

        (defaults.triple(), PriorSource::Default)
    }
}
