use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::calculator::bayes::clamp_probability;

// ============================================================================
// PRIOR TRIPLE
// ============================================================================

/// (P(active|occupied), P(active|vacant), prior), always clamped
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorTriple {
    pub prob_given_true: f64,
    pub prob_given_false: f64,
    pub prior: f64,
}

impl PriorTriple {
    pub fn new(prob_given_true: f64, prob_given_false: f64, prior: f64) -> Self {
        Self {
            prob_given_true: clamp_probability(prob_given_true),
            prob_given_false: clamp_probability(prob_given_false),
            prior: clamp_probability(prior),
        }
    }
}

// ============================================================================
// LEARNED PRIOR
// ============================================================================

/// Where a stored triple came from. Only `History` entries are treated as
/// learned when resolving priors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorSource {
    #[default]
    History,
    Timeslot,
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedPrior {
    pub entity_id: String,
    pub prob_given_true: f64,
    pub prob_given_false: f64,
    pub prior: f64,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub source: PriorSource,
}

impl LearnedPrior {
    pub fn new(
        entity_id: &str,
        triple: PriorTriple,
        source: PriorSource,
        last_updated: DateTime<Utc>,
    ) -> Self {
        let triple = PriorTriple::new(triple.prob_given_true, triple.prob_given_false, triple.prior);
        Self {
            entity_id: entity_id.to_string(),
            prob_given_true: triple.prob_given_true,
            prob_given_false: triple.prob_given_false,
            prior: triple.prior,
            last_updated,
            source,
        }
    }

    pub fn triple(&self) -> PriorTriple {
        PriorTriple::new(self.prob_given_true, self.prob_given_false, self.prior)
    }

    /// Re-clamp after deserialization; `None` when a field is not finite
    pub fn sanitized(self) -> Option<Self> {
        let finite = [self.prob_given_true, self.prob_given_false, self.prior]
            .iter()
            .all(|p| p.is_finite());
        if !finite || self.entity_id.is_empty() {
            return None;
        }
        let triple = self.triple();
        Some(Self {
            prob_given_true: triple.prob_given_true,
            prob_given_false: triple.prob_given_false,
            prior: triple.prior,
            ..self
        })
    }
}
