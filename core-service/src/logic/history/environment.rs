//! Environmental baselines
//!
//! A numeric sensor (illuminance, humidity, temperature) counts as active
//! when its value is strictly above `mean + 5% * (max - min)` of its history.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::ENVIRONMENTAL_BASELINE_PERCENT;
use crate::logic::host::HistoryMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentalBaselines(BTreeMap<String, f64>);

impl EnvironmentalBaselines {
    pub fn get(&self, entity_id: &str) -> Option<f64> {
        self.0.get(entity_id).copied()
    }

    pub fn insert(&mut self, entity_id: &str, upper_bound: f64) {
        self.0.insert(entity_id.to_string(), upper_bound);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Upper bound of "normal"; `None` when there are no values
pub fn upper_bound(values: &[f64]) -> Option<f64> {
    let values: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let max = values.iter().copied().fold(f64::MIN, f64::max);
    let min = values.iter().copied().fold(f64::MAX, f64::min);
    let range = max - min;
    if range == 0.0 {
        return Some(mean);
    }
    Some(mean + ENVIRONMENTAL_BASELINE_PERCENT * range)
}

/// Baselines for every environmental entity with numeric history
pub fn compute_baselines(history: &HistoryMap, entity_ids: &[String]) -> EnvironmentalBaselines {
    let mut baselines = EnvironmentalBaselines::default();
    for id in entity_ids {
        let Some(events) = history.get(id) else { continue };
        let values: Vec<f64> = events
            .iter()
            .filter_map(|e| e.state.trim().parse::<f64>().ok())
            .collect();
        if let Some(bound) = upper_bound(&values) {
            baselines.insert(id, bound);
        }
    }
    baselines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::host::HistoryEvent;
    use chrono::Utc;

    #[test]
    fn test_upper_bound() {
        // mean 20, range 20 -> 21
        assert_eq!(upper_bound(&[10.0, 20.0, 30.0]), Some(21.0));
        assert_eq!(upper_bound(&[5.0, 5.0]), Some(5.0));
        assert_eq!(upper_bound(&[]), None);
    }

    #[test]
    fn test_non_numeric_ignored() {
        let now = Utc::now();
        let mut history = HistoryMap::new();
        history.insert(
            "sensor.lux".to_string(),
            vec![
                HistoryEvent::new("100", now),
                HistoryEvent::new("unavailable", now),
                HistoryEvent::new("300", now),
            ],
        );
        history.insert(
            "sensor.broken".to_string(),
            vec![HistoryEvent::new("unknown", now)],
        );

        let baselines = compute_baselines(
            &history,
            &["sensor.lux".to_string(), "sensor.broken".to_string()],
        );
        assert_eq!(baselines.get("sensor.lux"), Some(210.0));
        assert_eq!(baselines.get("sensor.broken"), None);
        assert_eq!(baselines.len(), 1);
    }
}
