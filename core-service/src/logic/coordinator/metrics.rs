//! Sample history and the metrics derived from it

use chrono::{DateTime, Utc};

use crate::constants::{OCCUPANCY_HISTORY_LEN, PROBABILITY_HISTORY_LEN};
use crate::logic::calculator::DerivedMetrics;
use crate::logic::model::RingBuffer;
use crate::logic::storage::PersistedState;

#[derive(Debug, Clone)]
pub struct OccupancyHistory {
    probabilities: RingBuffer<f64>,
    occupancy: RingBuffer<bool>,
    last_occupied: Option<DateTime<Utc>>,
    last_state_change: Option<DateTime<Utc>>,
}

impl Default for OccupancyHistory {
    fn default() -> Self {
        Self {
            probabilities: RingBuffer::new(PROBABILITY_HISTORY_LEN),
            occupancy: RingBuffer::new(OCCUPANCY_HISTORY_LEN),
            last_occupied: None,
            last_state_change: None,
        }
    }
}

impl OccupancyHistory {
    pub fn restore(stored: &PersistedState) -> Self {
        Self {
            probabilities: RingBuffer::from_vec(stored.probability_history.clone(), PROBABILITY_HISTORY_LEN),
            occupancy: RingBuffer::from_vec(stored.occupancy_history.clone(), OCCUPANCY_HISTORY_LEN),
            last_occupied: stored.last_occupied,
            last_state_change: stored.last_state_change,
        }
    }

    pub fn record(&mut self, probability: f64, occupied: bool, now: DateTime<Utc>) {
        if self.occupancy.last() != Some(&occupied) {
            self.last_state_change = Some(now);
        }
        if occupied {
            self.last_occupied = Some(now);
        }
        self.probabilities.push(probability);
        self.occupancy.push(occupied);
    }

    pub fn probability_history(&self) -> Vec<f64> {
        self.probabilities.to_vec()
    }

    pub fn occupancy_history(&self) -> Vec<bool> {
        self.occupancy.to_vec()
    }

    pub fn last_occupied(&self) -> Option<DateTime<Utc>> {
        self.last_occupied
    }

    pub fn last_state_change(&self) -> Option<DateTime<Utc>> {
        self.last_state_change
    }

    pub fn metrics(&self, now: DateTime<Utc>, poll_interval_secs: u64) -> DerivedMetrics {
        let samples = self.probabilities.to_vec();
        if samples.is_empty() {
            return DerivedMetrics {
                last_occupied: self.last_occupied,
                ..Default::default()
            };
        }

        let n = samples.len() as f64;
        let moving_average = samples.iter().sum::<f64>() / n;
        let min_probability = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max_probability = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        // Per minute, assuming samples are one poll interval apart
        let rate_of_change = if samples.len() >= 2 && poll_interval_secs > 0 {
            let span_secs = (samples.len() - 1) as f64 * poll_interval_secs as f64;
            (samples[samples.len() - 1] - samples[0]) / span_secs * 60.0
        } else {
            0.0
        };

        let occupancy_rate = if self.occupancy.is_empty() {
            0.0
        } else {
            self.occupancy.iter().filter(|o| **o).count() as f64 / self.occupancy.len() as f64
        };

        let state_duration_secs = self
            .last_state_change
            .map(|t| ((now - t).num_milliseconds() as f64 / 1000.0).max(0.0))
            .unwrap_or(0.0);

        DerivedMetrics {
            moving_average,
            rate_of_change,
            occupancy_rate,
            min_probability,
            max_probability,
            state_duration_secs,
            last_occupied: self.last_occupied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_starts_empty() {
        let history = OccupancyHistory::default();
        assert!(history.probability_history().is_empty());
        let m = history.metrics(Utc::now(), 10);
        assert_eq!(m.moving_average, 0.0);
        assert_eq!(m.rate_of_change, 0.0);
    }

    #[test]
    fn test_metrics() {
        let start = Utc::now();
        let mut history = OccupancyHistory::default();
        history.record(0.2, false, start);
        history.record(0.4, false, start + Duration::seconds(10));
        history.record(0.8, true, start + Duration::seconds(20));

        let m = history.metrics(start + Duration::seconds(50), 10);
        assert!((m.moving_average - 1.4 / 3.0).abs() < 1e-9);
        // 0.6 over 20 seconds
        assert!((m.rate_of_change - 1.8).abs() < 1e-9);
        assert_eq!(m.min_probability, 0.2);
        assert_eq!(m.max_probability, 0.8);
        assert!((m.occupancy_rate - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(m.state_duration_secs, 30.0);
        assert_eq!(m.last_occupied, Some(start + Duration::seconds(20)));
    }

    #[test]
    fn test_capacity_and_restore() {
        let now = Utc::now();
        let mut history = OccupancyHistory::default();
        for i in 0..300 {
            history.record(0.5, i % 2 == 0, now);
        }
        assert_eq!(history.probability_history().len(), PROBABILITY_HISTORY_LEN);
        assert_eq!(history.occupancy_history().len(), OCCUPANCY_HISTORY_LEN);

        let stored = PersistedState {
            probability_history: history.probability_history(),
            occupancy_history: history.occupancy_history(),
            last_occupied: history.last_occupied(),
            last_state_change: history.last_state_change(),
            ..Default::default()
        };
        let restored = OccupancyHistory::restore(&stored);
        assert_eq!(restored.probability_history(), history.probability_history());
        assert_eq!(restored.occupancy_history(), history.occupancy_history());
    }
}
