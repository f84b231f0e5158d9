//! Historical Analyzer - learns per-entity likelihoods from recorded history
//!
//! Motion sensors define the occupancy ground truth: their merged `on`
//! spans are "occupied", their `off` spans (minus occupied) are "vacant".
//! Every other entity is scored by how much its own active time overlaps
//! each side.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PRIOR, DEFAULT_PROB_GIVEN_FALSE, DEFAULT_PROB_GIVEN_TRUE};
use crate::logic::config::SensorSet;
use crate::logic::error::HistoryError;
use crate::logic::host::{HistoryMap, HistoryProvider};
use crate::logic::priors::{LearnedPrior, PriorSource, PriorTriple};
use crate::logic::sensors::category::{STATE_OFF, STATE_ON};
use crate::logic::sensors::SensorCategory;

use super::correlation::{analyze_correlations, SensorCorrelations};
use super::environment::{compute_baselines, EnvironmentalBaselines};
use super::intervals::{
    active_intervals, clip, intervalize, merge_intervals, overlap_duration, subtract,
    total_duration, Interval,
};
use super::patterns::{motion_patterns, occupancy_patterns, MotionPattern, OccupancyPatterns};
use super::timeslots::{SlotLikelihood, TimeslotCache, TimeslotEntry, TimeslotKey};

// ============================================================================
// TYPES
// ============================================================================

/// A triple plus whether it was actually learned (false = fell back)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorEstimate {
    pub triple: PriorTriple,
    pub learned: bool,
}

impl PriorEstimate {
    fn fallback(triple: PriorTriple) -> Self {
        Self {
            triple,
            learned: false,
        }
    }
}

/// Diagnostic products of an analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisInsights {
    pub analyzed_at: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub correlations: SensorCorrelations,
    pub occupancy_patterns: OccupancyPatterns,
    pub motion_patterns: BTreeMap<String, MotionPattern>,
}

/// Everything one run produces, swapped in by the coordinator as a unit
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub learned_priors: BTreeMap<String, LearnedPrior>,
    pub timeslots: Option<TimeslotCache>,
    pub baselines: EnvironmentalBaselines,
    pub insights: AnalysisInsights,
}

/// Occupied / vacant ground truth derived from motion sensors
#[derive(Debug, Clone, Default)]
struct MotionTimeline {
    active: Vec<Interval>,
    inactive: Vec<Interval>,
}

impl MotionTimeline {
    fn build(history: &HistoryMap, motion_ids: &[String], start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let mut on = Vec::new();
        let mut off = Vec::new();

        for id in motion_ids {
            let Some(events) = history.get(id) else { continue };
            let spans = intervalize(events, start, end);
            on.extend(active_intervals(&spans, |s| s.eq_ignore_ascii_case(STATE_ON)));
            off.extend(active_intervals(&spans, |s| s.eq_ignore_ascii_case(STATE_OFF)));
        }

        let active = merge_intervals(on);
        let inactive = subtract(&merge_intervals(off), &active);
        Self { active, inactive }
    }

    fn clip(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            active: clip(&self.active, start, end),
            inactive: clip(&self.inactive, start, end),
        }
    }

    fn estimate(&self, entity_active: Option<&[Interval]>, defaults: PriorTriple) -> PriorEstimate {
        let Some(entity_active) = entity_active else {
            return PriorEstimate::fallback(defaults);
        };

        let active = total_duration(&self.active);
        let inactive = total_duration(&self.inactive);
        let total = active + inactive;
        if total <= 0.0 {
            return PriorEstimate::fallback(defaults);
        }

        let prob_given_true = if active > 0.0 {
            overlap_duration(entity_active, &self.active) / active
        } else {
            DEFAULT_PROB_GIVEN_TRUE
        };
        let prob_given_false = if inactive > 0.0 {
            overlap_duration(entity_active, &self.inactive) / inactive
        } else {
            DEFAULT_PROB_GIVEN_FALSE
        };

        PriorEstimate {
            triple: PriorTriple::new(prob_given_true, prob_given_false, active / total),
            learned: true,
        }
    }
}

// ============================================================================
// ANALYZER
// ============================================================================

#[derive(Debug, Clone)]
pub struct HistoricalAnalyzer {
    sensors: SensorSet,
    history_period_days: u32,
}

impl HistoricalAnalyzer {
    pub fn new(sensors: SensorSet, history_period_days: u32) -> Self {
        Self {
            sensors,
            history_period_days,
        }
    }

    /// Lookback window ending at `now`
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (now - Duration::days(self.history_period_days as i64), now)
    }

    fn defaults_for(&self, entity_id: &str) -> PriorTriple {
        match self.sensors.category_of(entity_id) {
            Some(category) => category.defaults().triple(),
            None => PriorTriple::new(DEFAULT_PROB_GIVEN_TRUE, DEFAULT_PROB_GIVEN_FALSE, DEFAULT_PRIOR),
        }
    }

    fn fetch_ids(&self, entity_ids: &[String]) -> Vec<String> {
        let mut ids = self.sensors.motion.clone();
        for id in entity_ids {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }

    /// Learned triple for one entity; any failure yields category defaults
    pub fn calculate_prior(
        &self,
        provider: &dyn HistoryProvider,
        entity_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PriorTriple {
        let ids = self.fetch_ids(&[entity_id.to_string()]);
        match provider.query_history(&ids, start, end) {
            Ok(history) => {
                let baselines = compute_baselines(&history, &self.sensors.environmental_ids());
                let timeline = MotionTimeline::build(&history, &self.sensors.motion, start, end);
                self.estimate_entity(&history, &timeline, entity_id, &baselines, start, end)
                    .triple
            }
            Err(e) => {
                log::warn!("History query for {} failed, using defaults: {}", entity_id, e);
                self.defaults_for(entity_id)
            }
        }
    }

    /// Rebuild the timeslot cache for `entity_ids` over the lookback window
    pub fn calculate_timeslots(
        &self,
        provider: &dyn HistoryProvider,
        entity_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<TimeslotCache, HistoryError> {
        let (start, end) = self.window(now);
        let history = provider.query_history(&self.fetch_ids(entity_ids), start, end)?;
        let baselines = compute_baselines(&history, &self.sensors.environmental_ids());
        let actives = self.entity_actives(&history, entity_ids, &baselines, start, end);
        let timeline = MotionTimeline::build(&history, &self.sensors.motion, start, end);
        Ok(self.build_timeslots(&timeline, &actives, entity_ids, start, end, now))
    }

    /// Full run: one history fetch feeding baselines, priors, optionally the
    /// timeslot cache, correlations and patterns
    pub fn analyze(
        &self,
        provider: &dyn HistoryProvider,
        now: DateTime<Utc>,
        rebuild_timeslots: bool,
    ) -> Result<AnalysisOutput, HistoryError> {
        let (start, end) = self.window(now);
        let entity_ids = self.sensors.all_ids();
        let history = provider.query_history(&entity_ids, start, end)?;

        let baselines = compute_baselines(&history, &self.sensors.environmental_ids());
        let timeline = MotionTimeline::build(&history, &self.sensors.motion, start, end);
        let actives = self.entity_actives(&history, &entity_ids, &baselines, start, end);

        let mut learned_priors = BTreeMap::new();
        for id in &entity_ids {
            let estimate = timeline.estimate(actives.get(id).map(Vec::as_slice), self.defaults_for(id));
            if estimate.learned {
                learned_priors.insert(
                    id.clone(),
                    LearnedPrior::new(id, estimate.triple, PriorSource::History, now),
                );
            }
        }

        let timeslots = rebuild_timeslots
            .then(|| self.build_timeslots(&timeline, &actives, &entity_ids, start, end, now));

        let insights = AnalysisInsights {
            analyzed_at: now,
            window_start: start,
            window_end: end,
            correlations: analyze_correlations(&actives, &self.sensors),
            occupancy_patterns: occupancy_patterns(&history, &self.sensors),
            motion_patterns: motion_patterns(&history, &self.sensors),
        };

        log::info!(
            "Historical analysis: {}/{} entities learned, {} baselines, {} timeslots",
            learned_priors.len(),
            entity_ids.len(),
            baselines.len(),
            timeslots.as_ref().map(|t| t.slots.len()).unwrap_or(0)
        );

        Ok(AnalysisOutput {
            learned_priors,
            timeslots,
            baselines,
            insights,
        })
    }

    fn category_predicate(&self, entity_id: &str) -> SensorCategory {
        // Unconfigured entities are judged like motion (plain on/off)
        self.sensors
            .category_of(entity_id)
            .unwrap_or(SensorCategory::Motion)
    }

    fn entity_active(
        &self,
        history: &HistoryMap,
        entity_id: &str,
        baselines: &EnvironmentalBaselines,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Option<Vec<Interval>> {
        let events = history.get(entity_id).filter(|e| !e.is_empty())?;
        let category = self.category_predicate(entity_id);
        let baseline = baselines.get(entity_id);
        let spans = intervalize(events, start, end);
        Some(active_intervals(&spans, |s| category.is_active(s, baseline)))
    }

    fn entity_actives(
        &self,
        history: &HistoryMap,
        entity_ids: &[String],
        baselines: &EnvironmentalBaselines,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> HashMap<String, Vec<Interval>> {
        entity_ids
            .iter()
            .filter_map(|id| {
                self.entity_active(history, id, baselines, start, end)
                    .map(|active| (id.clone(), active))
            })
            .collect()
    }

    fn estimate_entity(
        &self,
        history: &HistoryMap,
        timeline: &MotionTimeline,
        entity_id: &str,
        baselines: &EnvironmentalBaselines,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PriorEstimate {
        let active = self.entity_active(history, entity_id, baselines, start, end);
        timeline.estimate(active.as_deref(), self.defaults_for(entity_id))
    }

    fn build_timeslots(
        &self,
        timeline: &MotionTimeline,
        actives: &HashMap<String, Vec<Interval>>,
        entity_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> TimeslotCache {
        // slot -> entity -> (sum p_true, sum p_false, days)
        let mut sums: BTreeMap<TimeslotKey, BTreeMap<String, (f64, f64, u32)>> = BTreeMap::new();

        let mut date = start.date_naive();
        while date <= end.date_naive() {
            for key in TimeslotKey::all() {
                let (slot_start, slot_end) = key.span_on(date);
                let (slot_start, slot_end) = (slot_start.max(start), slot_end.min(end));
                if slot_end <= slot_start {
                    continue;
                }

                let slot_timeline = timeline.clip(slot_start, slot_end);
                for id in entity_ids {
                    let Some(active) = actives.get(id) else { continue };
                    let slot_active = clip(active, slot_start, slot_end);
                    let estimate = slot_timeline.estimate(Some(&slot_active), self.defaults_for(id));
                    if !estimate.learned {
                        continue;
                    }
                    let entry = sums.entry(key).or_default().entry(id.clone()).or_default();
                    entry.0 += estimate.triple.prob_given_true;
                    entry.1 += estimate.triple.prob_given_false;
                    entry.2 += 1;
                }
            }
            let Some(next) = date.succ_opt() else { break };
            date = next;
        }

        let slots = sums
            .into_iter()
            .map(|(key, per_entity)| {
                let entities: BTreeMap<String, SlotLikelihood> = per_entity
                    .into_iter()
                    .map(|(id, (p_t, p_f, days))| {
                        let triple = PriorTriple::new(p_t / days as f64, p_f / days as f64, DEFAULT_PRIOR);
                        (
                            id,
                            SlotLikelihood {
                                prob_given_true: triple.prob_given_true,
                                prob_given_false: triple.prob_given_false,
                                samples: days,
                            },
                        )
                    })
                    .collect();

                let combined = PriorTriple::new(
                    entities.values().map(|e| e.prob_given_true).product(),
                    entities.values().map(|e| e.prob_given_false).product(),
                    DEFAULT_PRIOR,
                );
                (
                    key,
                    TimeslotEntry {
                        entities,
                        combined_prob_given_true: Some(combined.prob_given_true),
                        combined_prob_given_false: Some(combined.prob_given_false),
                    },
                )
            })
            .collect();

        TimeslotCache {
            slots,
            last_updated: now,
        }
    }
}
