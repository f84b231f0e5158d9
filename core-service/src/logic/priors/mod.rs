//! Prior Store - per-entity likelihoods learned from history
//!
//! Entries come from two writers: historical analysis (`History`, replaced
//! wholesale per run) and the calculator's online feedback (`Timeslot` /
//! `Default`, never overwriting a learned entry).

pub mod types;

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

pub use types::{LearnedPrior, PriorSource, PriorTriple};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriorStore {
    priors: BTreeMap<String, LearnedPrior>,
}

impl PriorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from persisted records, dropping malformed ones
    pub fn from_records(records: impl IntoIterator<Item = LearnedPrior>) -> Self {
        let mut store = Self::new();
        for record in records {
            match record.sanitized() {
                Some(prior) => {
                    store.priors.insert(prior.entity_id.clone(), prior);
                }
                None => log::debug!("[Priors] Discarding malformed stored prior"),
            }
        }
        store
    }

    pub fn get(&self, entity_id: &str) -> Option<&LearnedPrior> {
        self.priors.get(entity_id)
    }

    /// Entry learned from history, if any
    pub fn learned(&self, entity_id: &str) -> Option<&LearnedPrior> {
        self.priors
            .get(entity_id)
            .filter(|p| p.source == PriorSource::History)
    }

    /// Online feedback write. A learned entry is only refreshed by another
    /// learned value.
    pub fn record(&mut self, prior: LearnedPrior) {
        if let Some(existing) = self.priors.get(&prior.entity_id) {
            if existing.source == PriorSource::History && prior.source != PriorSource::History {
                return;
            }
        }
        let Some(prior) = prior.sanitized() else { return };
        self.priors.insert(prior.entity_id.clone(), prior);
    }

    /// Swap in one analysis run's learned priors
    pub fn merge_learned(&mut self, learned: BTreeMap<String, LearnedPrior>) {
        for (id, prior) in learned {
            if let Some(prior) = prior.sanitized() {
                self.priors.insert(id, LearnedPrior {
                    source: PriorSource::History,
                    ..prior
                });
            }
        }
    }

    pub fn retain(&mut self, configured: &HashSet<String>) {
        self.priors.retain(|id, _| configured.contains(id));
    }

    pub fn len(&self) -> usize {
        self.priors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.priors.is_empty()
    }

    pub fn learned_count(&self) -> usize {
        self.priors
            .values()
            .filter(|p| p.source == PriorSource::History)
            .count()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.priors.values().map(|p| p.last_updated).max()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LearnedPrior> {
        self.priors.values()
    }

    pub fn to_map(&self) -> BTreeMap<String, LearnedPrior> {
        self.priors.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prior(id: &str, source: PriorSource, p: f64) -> LearnedPrior {
        LearnedPrior::new(id, PriorTriple::new(p, 0.05, 0.3), source, Utc::now())
    }

    #[test]
    fn test_new_clamps() {
        let p = LearnedPrior::new(
            "m",
            PriorTriple::new(1.5, -0.2, 0.5),
            PriorSource::History,
            Utc::now(),
        );
        assert_eq!(p.prob_given_true, 0.99);
        assert_eq!(p.prob_given_false, 0.01);
    }

    #[test]
    fn test_feedback_never_overwrites_learned() {
        let mut store = PriorStore::new();
        store.record(prior("m", PriorSource::History, 0.8));
        store.record(prior("m", PriorSource::Default, 0.25));

        assert_eq!(store.get("m").unwrap().prob_given_true, 0.8);
        assert!(store.learned("m").is_some());
    }

    #[test]
    fn test_feedback_entries_are_not_learned() {
        let mut store = PriorStore::new();
        store.record(prior("light", PriorSource::Timeslot, 0.4));
        assert!(store.get("light").is_some());
        assert!(store.learned("light").is_none());
        assert_eq!(store.learned_count(), 0);
    }

    #[test]
    fn test_merge_learned_replaces_feedback() {
        let mut store = PriorStore::new();
        store.record(prior("m", PriorSource::Default, 0.25));

        let mut learned = BTreeMap::new();
        learned.insert("m".to_string(), prior("m", PriorSource::History, 0.7));
        store.merge_learned(learned);

        assert_eq!(store.learned("m").unwrap().prob_given_true, 0.7);
    }

    #[test]
    fn test_from_records_drops_malformed() {
        let mut bad = prior("bad", PriorSource::History, 0.5);
        bad.prior = f64::NAN;
        let store = PriorStore::from_records(vec![prior("ok", PriorSource::History, 0.5), bad]);

        assert_eq!(store.len(), 1);
        assert!(store.get("ok").is_some());
    }

    #[test]
    fn test_retain() {
        let mut store = PriorStore::new();
        store.record(prior("a", PriorSource::History, 0.5));
        store.record(prior("b", PriorSource::History, 0.5));
        store.retain(&["a".to_string()].into_iter().collect());
        assert_eq!(store.len(), 1);
    }
}
