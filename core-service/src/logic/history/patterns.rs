//! Occupancy and motion patterns (diagnostic only)
//!
//! Each recorded state change is one sample. Samples are bucketed by
//! timeslot and by weekday; a sample counts as active for motion `on` or
//! media `playing`.

use std::collections::BTreeMap;

use chrono::{Datelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::logic::config::SensorSet;
use crate::logic::host::{HistoryEvent, HistoryMap};
use crate::logic::sensors::category::{STATE_ON, STATE_PLAYING};

use super::intervals::{active_intervals, intervalize, total_duration};
use super::timeslots::TimeslotKey;

const SLOT_CONFIDENCE_SAMPLES: f64 = 100.0;
const DAY_CONFIDENCE_SAMPLES: f64 = 50.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternBucket {
    pub samples: u32,
    pub active: u32,
    pub occupancy_ratio: f64,
    pub confidence: f64,
}

impl PatternBucket {
    fn add(&mut self, active: bool) {
        self.samples += 1;
        if active {
            self.active += 1;
        }
    }

    fn finish(&mut self, confidence_samples: f64) {
        self.occupancy_ratio = if self.samples > 0 {
            self.active as f64 / self.samples as f64
        } else {
            0.0
        };
        self.confidence = (self.samples as f64 / confidence_samples).min(1.0);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OccupancyPatterns {
    pub time_slots: BTreeMap<TimeslotKey, PatternBucket>,
    pub day_patterns: BTreeMap<String, PatternBucket>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionPattern {
    pub total_activations: u32,
    pub average_duration_secs: f64,
    pub time_slots: BTreeMap<TimeslotKey, PatternBucket>,
    pub day_patterns: BTreeMap<String, PatternBucket>,
}

pub fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

fn bucket_events<'a>(
    events: impl Iterator<Item = (&'a HistoryEvent, bool)>,
) -> (BTreeMap<TimeslotKey, PatternBucket>, BTreeMap<String, PatternBucket>) {
    let mut slots: BTreeMap<TimeslotKey, PatternBucket> = BTreeMap::new();
    let mut days: BTreeMap<String, PatternBucket> = BTreeMap::new();

    for (event, active) in events {
        slots
            .entry(TimeslotKey::from_time(event.changed_at))
            .or_default()
            .add(active);
        days.entry(day_name(event.changed_at.weekday()).to_string())
            .or_default()
            .add(active);
    }

    slots
        .values_mut()
        .for_each(|b| b.finish(SLOT_CONFIDENCE_SAMPLES));
    days.values_mut()
        .for_each(|b| b.finish(DAY_CONFIDENCE_SAMPLES));
    (slots, days)
}

/// Area-wide patterns over motion and media history
pub fn occupancy_patterns(history: &HistoryMap, sensors: &SensorSet) -> OccupancyPatterns {
    let motion = sensors.motion.iter().filter_map(|id| history.get(id)).flat_map(|events| {
        events
            .iter()
            .map(|e| (e, e.state.eq_ignore_ascii_case(STATE_ON)))
    });
    let media = sensors.media.iter().filter_map(|id| history.get(id)).flat_map(|events| {
        events
            .iter()
            .map(|e| (e, e.state.eq_ignore_ascii_case(STATE_PLAYING)))
    });

    let (time_slots, day_patterns) = bucket_events(motion.chain(media));
    OccupancyPatterns {
        time_slots,
        day_patterns,
    }
}

/// Per-motion-sensor activation statistics
pub fn motion_patterns(history: &HistoryMap, sensors: &SensorSet) -> BTreeMap<String, MotionPattern> {
    let mut out = BTreeMap::new();

    for id in &sensors.motion {
        let Some(events) = history.get(id) else { continue };
        if events.is_empty() {
            continue;
        }

        let total_activations = events
            .iter()
            .filter(|e| e.state.eq_ignore_ascii_case(STATE_ON))
            .count() as u32;

        // Activation lengths between first and last recorded change
        let (first, last) = (events[0].changed_at, events[events.len() - 1].changed_at);
        let spans = intervalize(events, first, last);
        let on_spans = active_intervals(&spans, |s| s.eq_ignore_ascii_case(STATE_ON));
        let average_duration_secs = if on_spans.is_empty() {
            0.0
        } else {
            total_duration(&on_spans) / on_spans.len() as f64
        };

        let (time_slots, day_patterns) = bucket_events(
            events
                .iter()
                .map(|e| (e, e.state.eq_ignore_ascii_case(STATE_ON))),
        );

        out.insert(
            id.clone(),
            MotionPattern {
                total_activations,
                average_duration_secs,
                time_slots,
                day_patterns,
            },
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    // 2024-01-01 is a Monday
    fn t(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, min, 0).unwrap()
    }

    fn sensors() -> SensorSet {
        SensorSet {
            motion: vec!["m".into()],
            media: vec!["tv".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_occupancy_patterns_ratio() {
        let mut history = HistoryMap::new();
        history.insert(
            "m".into(),
            vec![
                HistoryEvent::new("on", t(8, 0)),
                HistoryEvent::new("off", t(8, 10)),
            ],
        );
        history.insert("tv".into(), vec![HistoryEvent::new("playing", t(8, 20))]);

        let patterns = occupancy_patterns(&history, &sensors());
        let slot = &patterns.time_slots[&"08:00".parse().unwrap()];
        assert_eq!(slot.samples, 3);
        assert_eq!(slot.active, 2);
        assert!((slot.occupancy_ratio - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(slot.confidence, 0.03);

        let monday = &patterns.day_patterns["monday"];
        assert_eq!(monday.samples, 3);
        assert!((monday.confidence - 0.06).abs() < 1e-12);
    }

    #[test]
    fn test_motion_pattern_durations() {
        let mut history = HistoryMap::new();
        history.insert(
            "m".into(),
            vec![
                HistoryEvent::new("on", t(8, 0)),
                HistoryEvent::new("off", t(8, 10)),
                HistoryEvent::new("on", t(9, 0)),
                HistoryEvent::new("off", t(9, 20)),
            ],
        );

        let patterns = motion_patterns(&history, &sensors());
        let m = &patterns["m"];
        assert_eq!(m.total_activations, 2);
        assert_eq!(m.average_duration_secs, Duration::minutes(15).num_seconds() as f64);
        assert!(patterns.get("tv").is_none());
    }
}
