//! Timeslot cache - 48 half-hour UTC buckets keyed "HH:MM"

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::{TIMESLOTS_PER_DAY, TIMESLOT_MINUTES};

// ============================================================================
// KEY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeslotKey(u8);

impl TimeslotKey {
    pub fn from_index(index: usize) -> Option<Self> {
        (index < TIMESLOTS_PER_DAY).then_some(Self(index as u8))
    }

    /// Bucket containing `at` (UTC)
    pub fn from_time(at: DateTime<Utc>) -> Self {
        let minutes = at.hour() * 60 + at.minute();
        Self((minutes / TIMESLOT_MINUTES) as u8)
    }

    pub fn all() -> impl Iterator<Item = TimeslotKey> {
        (0..TIMESLOTS_PER_DAY as u8).map(TimeslotKey)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn hour(&self) -> u32 {
        self.0 as u32 * TIMESLOT_MINUTES / 60
    }

    pub fn minute(&self) -> u32 {
        self.0 as u32 * TIMESLOT_MINUTES % 60
    }

    /// Start and end of this bucket on `date`
    pub fn span_on(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let midnight = date.and_time(chrono::NaiveTime::MIN).and_utc();
        let start = midnight + Duration::minutes((self.0 as u32 * TIMESLOT_MINUTES) as i64);
        (start, start + Duration::minutes(TIMESLOT_MINUTES as i64))
    }
}

impl fmt::Display for TimeslotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeslotKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| format!("invalid timeslot `{s}`"))?;
        let h: u32 = h.parse().map_err(|_| format!("invalid hour in `{s}`"))?;
        let m: u32 = m.parse().map_err(|_| format!("invalid minute in `{s}`"))?;
        if h >= 24 || m % TIMESLOT_MINUTES != 0 || m >= 60 {
            return Err(format!("timeslot `{s}` is not a bucket boundary"));
        }
        Ok(Self(((h * 60 + m) / TIMESLOT_MINUTES) as u8))
    }
}

impl Serialize for TimeslotKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeslotKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// CACHE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotLikelihood {
    pub prob_given_true: f64,
    pub prob_given_false: f64,
    /// Days that contributed
    pub samples: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeslotEntry {
    pub entities: BTreeMap<String, SlotLikelihood>,
    pub combined_prob_given_true: Option<f64>,
    pub combined_prob_given_false: Option<f64>,
}

impl TimeslotEntry {
    pub fn entity(&self, entity_id: &str) -> Option<&SlotLikelihood> {
        self.entities.get(entity_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeslotCache {
    pub slots: BTreeMap<TimeslotKey, TimeslotEntry>,
    pub last_updated: DateTime<Utc>,
}

impl TimeslotCache {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            slots: BTreeMap::new(),
            last_updated: now,
        }
    }

    pub fn slot(&self, key: TimeslotKey) -> Option<&TimeslotEntry> {
        self.slots.get(&key)
    }

    pub fn current(&self, now: DateTime<Utc>) -> Option<&TimeslotEntry> {
        self.slot(TimeslotKey::from_time(now))
    }

    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now - self.last_updated >= max_age
    }
}
