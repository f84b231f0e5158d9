//! Exponential decay of occupancy probability after evidence stops
//!
//! `factor = exp(-DECAY_LAMBDA * elapsed / window)`, applied to the peak
//! reached at the last positive trigger so cycles do not compound.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DECAY_LAMBDA;
use crate::logic::config::DecayConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayState {
    pub enabled: bool,
    pub last_positive_trigger: Option<DateTime<Utc>>,
    pub peak_probability: Option<f64>,
    pub decay_window_secs: u64,
    pub decay_min_delay_secs: u64,
}

impl DecayState {
    pub fn new(config: &DecayConfig) -> Self {
        Self {
            enabled: config.enabled,
            last_positive_trigger: None,
            peak_probability: None,
            decay_window_secs: config.window_secs,
            decay_min_delay_secs: config.min_delay_secs,
        }
    }

    /// Apply new options, keeping trigger history
    pub fn reconfigure(&mut self, config: &DecayConfig) {
        self.enabled = config.enabled;
        self.decay_window_secs = config.window_secs;
        self.decay_min_delay_secs = config.min_delay_secs;
    }

    /// State after a cycle with active evidence
    pub fn triggered(&self, now: DateTime<Utc>, probability: f64) -> Self {
        Self {
            last_positive_trigger: Some(now),
            peak_probability: Some(probability),
            ..self.clone()
        }
    }

    /// Factor in (0, 1] for a cycle without active evidence
    pub fn factor_at(&self, now: DateTime<Utc>) -> f64 {
        if !self.enabled || self.decay_window_secs == 0 {
            return 1.0;
        }
        let Some(last) = self.last_positive_trigger else {
            return 1.0;
        };

        let elapsed = (now - last).num_milliseconds() as f64 / 1000.0;
        if elapsed <= self.decay_min_delay_secs as f64 {
            return 1.0;
        }
        decay_factor(elapsed, self.decay_window_secs as f64)
    }

    /// Decayed probability, never above `previous`
    pub fn apply(&self, previous: f64, now: DateTime<Utc>) -> DecayOutcome {
        let factor = self.factor_at(now);
        if factor >= 1.0 {
            return DecayOutcome {
                probability: previous,
                factor: 1.0,
            };
        }
        let peak = self.peak_probability.unwrap_or(previous);
        DecayOutcome {
            probability: previous.min(peak * factor),
            factor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayOutcome {
    pub probability: f64,
    pub factor: f64,
}

pub fn decay_factor(elapsed_secs: f64, window_secs: f64) -> f64 {
    if window_secs <= 0.0 || elapsed_secs <= 0.0 {
        return 1.0;
    }
    (-DECAY_LAMBDA * elapsed_secs / window_secs).exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn state() -> DecayState {
        DecayState::new(&DecayConfig::default())
    }

    #[test]
    fn test_half_window_factor() {
        let f = decay_factor(300.0, 600.0);
        assert!((f - 0.648).abs() < 0.001);
    }

    #[test]
    fn test_no_decay_within_min_delay() {
        let now = Utc::now();
        let s = state().triggered(now, 0.9);
        let out = s.apply(0.9, now + Duration::seconds(45));
        assert_eq!(out.factor, 1.0);
        assert_eq!(out.probability, 0.9);
    }

    #[test]
    fn test_decay_from_peak_does_not_compound() {
        let now = Utc::now();
        let s = state().triggered(now, 0.9);

        let first = s.apply(0.9, now + Duration::seconds(300));
        let second = s.apply(first.probability, now + Duration::seconds(310));

        assert!((first.probability - 0.9 * 0.648).abs() < 0.001);
        // Measured from the peak, not from the already-decayed value
        assert!((second.probability - 0.9 * decay_factor(310.0, 600.0)).abs() < 1e-9);
    }

    #[test]
    fn test_monotone_non_increasing() {
        let now = Utc::now();
        let s = state().triggered(now, 0.95);
        let mut previous = 0.95;
        for secs in (0..=1800).step_by(10) {
            let out = s.apply(previous, now + Duration::seconds(secs));
            assert!(out.probability <= previous);
            previous = out.probability;
        }
    }

    #[test]
    fn test_disabled_or_untriggered() {
        let now = Utc::now();
        assert_eq!(state().factor_at(now), 1.0);

        let mut s = state().triggered(now, 0.9);
        s.reconfigure(&DecayConfig::disabled());
        assert_eq!(s.factor_at(now + Duration::seconds(900)), 1.0);
    }
}
