//! Cross-sensor correlation (diagnostic only)

use std::collections::{BTreeMap, HashMap};

use crate::constants::CORRELATION_THRESHOLD;
use crate::logic::config::SensorSet;

use super::intervals::{overlap_duration, total_duration, Interval};

/// motion entity -> correlated entity -> score
pub type SensorCorrelations = BTreeMap<String, BTreeMap<String, f64>>;

/// `2 * overlap / (active_a + active_b)`, 0 when neither was ever active
pub fn correlation(a: &[Interval], b: &[Interval]) -> f64 {
    let total = total_duration(a) + total_duration(b);
    if total <= 0.0 {
        return 0.0;
    }
    (2.0 * overlap_duration(a, b) / total).clamp(0.0, 1.0)
}

/// Score each motion sensor against media devices and other motion
/// sensors, keeping pairs above the threshold
pub fn analyze_correlations(
    active: &HashMap<String, Vec<Interval>>,
    sensors: &SensorSet,
) -> SensorCorrelations {
    let mut out = SensorCorrelations::new();

    for motion_id in &sensors.motion {
        let Some(motion_active) = active.get(motion_id) else { continue };

        let candidates = sensors
            .media
            .iter()
            .chain(sensors.motion.iter())
            .filter(|id| *id != motion_id);

        for other_id in candidates {
            let Some(other_active) = active.get(other_id) else { continue };
            let score = correlation(motion_active, other_active);
            if score > CORRELATION_THRESHOLD {
                out.entry(motion_id.clone())
                    .or_default()
                    .insert(other_id.clone(), score);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(min)
    }

    #[test]
    fn test_identical_timelines_fully_correlated() {
        let a = vec![Interval::new(t(0), t(30))];
        assert!((correlation(&a, &a) - 1.0).abs() < 1e-12);
        assert_eq!(correlation(&[], &[]), 0.0);
    }

    #[test]
    fn test_weak_pairs_dropped() {
        let sensors = SensorSet {
            motion: vec!["m1".into(), "m2".into()],
            media: vec!["tv".into()],
            ..Default::default()
        };
        let mut active = HashMap::new();
        active.insert("m1".to_string(), vec![Interval::new(t(0), t(60))]);
        // 50 of 60 minutes shared
        active.insert("m2".to_string(), vec![Interval::new(t(10), t(60))]);
        // 5 minutes shared
        active.insert("tv".to_string(), vec![Interval::new(t(55), t(120))]);

        let out = analyze_correlations(&active, &sensors);
        let m1 = &out["m1"];
        assert!(m1.contains_key("m2"));
        assert!(!m1.contains_key("tv"));
        assert!(out["m2"].contains_key("m1"));
    }
}
