//! Sensor categories, default likelihoods and "active" predicates

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::logic::priors::PriorTriple;

// ============================================================================
// HOST STATE STRINGS
// ============================================================================

pub const STATE_ON: &str = "on";
pub const STATE_OFF: &str = "off";
pub const STATE_OPEN: &str = "open";
pub const STATE_CLOSED: &str = "closed";
pub const STATE_PLAYING: &str = "playing";
pub const STATE_PAUSED: &str = "paused";
pub const STATE_ACTIVE: &str = "active";
pub const STATE_UNAVAILABLE: &str = "unavailable";
pub const STATE_UNKNOWN: &str = "unknown";

/// Host reports the entity as missing or broken
pub fn is_unavailable_state(state: &str) -> bool {
    state.is_empty() || state == STATE_UNAVAILABLE || state == STATE_UNKNOWN
}

// ============================================================================
// CATEGORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorCategory {
    Motion,
    Media,
    Appliance,
    Door,
    Window,
    Light,
    Illuminance,
    Humidity,
    Temperature,
}

/// Category defaults: likelihood triple plus evidence weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryDefaults {
    pub prob_given_true: f64,
    pub prob_given_false: f64,
    pub prior: f64,
    pub weight: f64,
}

impl CategoryDefaults {
    pub fn triple(&self) -> PriorTriple {
        PriorTriple::new(self.prob_given_true, self.prob_given_false, self.prior)
    }
}

impl SensorCategory {
    pub const ALL: [SensorCategory; 9] = [
        SensorCategory::Motion,
        SensorCategory::Media,
        SensorCategory::Appliance,
        SensorCategory::Door,
        SensorCategory::Window,
        SensorCategory::Light,
        SensorCategory::Illuminance,
        SensorCategory::Humidity,
        SensorCategory::Temperature,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorCategory::Motion => "motion",
            SensorCategory::Media => "media",
            SensorCategory::Appliance => "appliance",
            SensorCategory::Door => "door",
            SensorCategory::Window => "window",
            SensorCategory::Light => "light",
            SensorCategory::Illuminance => "illuminance",
            SensorCategory::Humidity => "humidity",
            SensorCategory::Temperature => "temperature",
        }
    }

    /// Numeric sensors judged against a learned baseline
    pub fn is_environmental(&self) -> bool {
        matches!(
            self,
            SensorCategory::Illuminance | SensorCategory::Humidity | SensorCategory::Temperature
        )
    }

    pub fn defaults(&self) -> CategoryDefaults {
        let (prob_given_true, prob_given_false, prior, weight) = match self {
            SensorCategory::Motion => (
                MOTION_PROB_GIVEN_TRUE,
                MOTION_PROB_GIVEN_FALSE,
                MOTION_DEFAULT_PRIOR,
                DEFAULT_WEIGHT_MOTION,
            ),
            SensorCategory::Media => (
                MEDIA_PROB_GIVEN_TRUE,
                MEDIA_PROB_GIVEN_FALSE,
                MEDIA_DEFAULT_PRIOR,
                DEFAULT_WEIGHT_MEDIA,
            ),
            SensorCategory::Appliance => (
                APPLIANCE_PROB_GIVEN_TRUE,
                APPLIANCE_PROB_GIVEN_FALSE,
                APPLIANCE_DEFAULT_PRIOR,
                DEFAULT_WEIGHT_APPLIANCE,
            ),
            SensorCategory::Door => (
                DOOR_PROB_GIVEN_TRUE,
                DOOR_PROB_GIVEN_FALSE,
                DOOR_DEFAULT_PRIOR,
                DEFAULT_WEIGHT_DOOR,
            ),
            SensorCategory::Window => (
                WINDOW_PROB_GIVEN_TRUE,
                WINDOW_PROB_GIVEN_FALSE,
                WINDOW_DEFAULT_PRIOR,
                DEFAULT_WEIGHT_WINDOW,
            ),
            SensorCategory::Light => (
                LIGHT_PROB_GIVEN_TRUE,
                LIGHT_PROB_GIVEN_FALSE,
                LIGHT_DEFAULT_PRIOR,
                DEFAULT_WEIGHT_LIGHT,
            ),
            SensorCategory::Illuminance
            | SensorCategory::Humidity
            | SensorCategory::Temperature => (
                ENVIRONMENTAL_PROB_GIVEN_TRUE,
                ENVIRONMENTAL_PROB_GIVEN_FALSE,
                ENVIRONMENTAL_DEFAULT_PRIOR,
                DEFAULT_WEIGHT_ENVIRONMENTAL,
            ),
        };
        CategoryDefaults {
            prob_given_true,
            prob_given_false,
            prior,
            weight,
        }
    }

    /// Whether `state` counts as evidence of occupancy.
    ///
    /// Doors count as active when closed (someone shut themselves in).
    /// Environmental sensors need a learned baseline; without one they are
    /// never active.
    pub fn is_active(&self, state: &str, environmental_baseline: Option<f64>) -> bool {
        let state = state.trim().to_ascii_lowercase();
        match self {
            SensorCategory::Motion => state == STATE_ON,
            SensorCategory::Media => state == STATE_PLAYING || state == STATE_PAUSED,
            SensorCategory::Appliance => state == STATE_ON || state == STATE_ACTIVE,
            SensorCategory::Door => state == STATE_OFF || state == STATE_CLOSED,
            SensorCategory::Window => state == STATE_ON || state == STATE_OPEN,
            SensorCategory::Light => state == STATE_ON,
            SensorCategory::Illuminance
            | SensorCategory::Humidity
            | SensorCategory::Temperature => match (environmental_baseline, state.parse::<f64>()) {
                (Some(baseline), Ok(value)) if value.is_finite() => value > baseline,
                _ => false,
            },
        }
    }
}

impl fmt::Display for SensorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_door_closed_is_active() {
        assert!(SensorCategory::Door.is_active("closed", None));
        assert!(SensorCategory::Door.is_active("off", None));
        assert!(!SensorCategory::Door.is_active("open", None));
        assert!(!SensorCategory::Door.is_active("on", None));
    }

    #[test]
    fn test_media_paused_counts() {
        assert!(SensorCategory::Media.is_active("paused", None));
        assert!(SensorCategory::Media.is_active("playing", None));
        assert!(!SensorCategory::Media.is_active("idle", None));
    }

    #[test]
    fn test_environmental_needs_baseline() {
        assert!(!SensorCategory::Illuminance.is_active("500", None));
        assert!(SensorCategory::Illuminance.is_active("500", Some(120.0)));
        assert!(!SensorCategory::Illuminance.is_active("120", Some(120.0)));
        assert!(!SensorCategory::Temperature.is_active("warm", Some(20.0)));
    }

    #[test]
    fn test_defaults_table() {
        let motion = SensorCategory::Motion.defaults();
        assert_eq!(motion.prob_given_true, 0.25);
        assert_eq!(motion.prob_given_false, 0.05);
        assert_eq!(motion.prior, 0.35);
        assert_eq!(motion.weight, 0.85);

        let humidity = SensorCategory::Humidity.defaults();
        assert_eq!(humidity.prior, 0.0769);
        assert_eq!(humidity.weight, 0.1);
    }

    #[test]
    fn test_unavailable_states() {
        assert!(is_unavailable_state("unavailable"));
        assert!(is_unavailable_state("unknown"));
        assert!(is_unavailable_state(""));
        assert!(!is_unavailable_state("off"));
    }
}
