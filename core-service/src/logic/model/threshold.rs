//! Occupancy Threshold
//!
//! User-facing threshold is a percentage (0-100); the calculator compares
//! against its decimal form.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_THRESHOLD_PERCENT;
use crate::logic::error::{CalculationError, ConfigError};

/// Occupancy threshold in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OccupancyThreshold(f64);

impl Default for OccupancyThreshold {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD_PERCENT)
    }
}

impl OccupancyThreshold {
    pub fn new(percent: f64) -> Result<Self, ConfigError> {
        let threshold = Self(percent);
        threshold.validate()?;
        Ok(threshold)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.0.is_finite() || !(0.0..=100.0).contains(&self.0) {
            return Err(ConfigError::ThresholdOutOfRange(self.0));
        }
        Ok(())
    }

    pub fn percent(&self) -> f64 {
        self.0
    }

    /// Decimal form, checked at calculation time
    pub fn decimal(&self) -> Result<f64, CalculationError> {
        if !self.0.is_finite() {
            return Err(CalculationError::InvalidThreshold(self.0));
        }
        Ok(self.0 / 100.0)
    }

    /// Occupied when probability reaches the threshold
    pub fn is_occupied(&self, probability: f64) -> Result<bool, CalculationError> {
        Ok(probability >= self.decimal()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_default() {
        let threshold = OccupancyThreshold::default();
        assert_eq!(threshold.percent(), 50.0);
        assert_eq!(threshold.decimal().unwrap(), 0.5);
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(OccupancyThreshold::new(0.0).is_ok());
        assert!(OccupancyThreshold::new(100.0).is_ok());
        assert!(OccupancyThreshold::new(100.5).is_err());
        assert!(OccupancyThreshold::new(-1.0).is_err());
        assert!(OccupancyThreshold::new(f64::NAN).is_err());
    }

    #[test]
    fn test_is_occupied_inclusive() {
        let threshold = OccupancyThreshold::new(60.0).unwrap();
        assert!(threshold.is_occupied(0.6).unwrap());
        assert!(!threshold.is_occupied(0.59).unwrap());
    }

    #[test]
    fn test_non_finite_threshold_fails_calculation() {
        let threshold = OccupancyThreshold(f64::INFINITY);
        assert!(matches!(
            threshold.is_occupied(0.5),
            Err(CalculationError::InvalidThreshold(_))
        ));
    }
}
