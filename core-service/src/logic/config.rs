//! Area Configuration
//!
//! One `AreaConfig` per monitored space. Loaded from JSON or built in code,
//! validated once at setup; a failed validation is fatal.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::logic::error::ConfigError;
use crate::logic::model::OccupancyThreshold;
use crate::logic::sensors::SensorCategory;

// ============================================================================
// SENSORS
// ============================================================================

/// Entity ids grouped by category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSet {
    pub motion: Vec<String>,
    pub media: Vec<String>,
    pub appliances: Vec<String>,
    pub doors: Vec<String>,
    pub windows: Vec<String>,
    pub lights: Vec<String>,
    pub illuminance: Vec<String>,
    pub humidity: Vec<String>,
    pub temperature: Vec<String>,
}

impl SensorSet {
    pub fn ids_for(&self, category: SensorCategory) -> &[String] {
        match category {
            SensorCategory::Motion => &self.motion,
            SensorCategory::Media => &self.media,
            SensorCategory::Appliance => &self.appliances,
            SensorCategory::Door => &self.doors,
            SensorCategory::Window => &self.windows,
            SensorCategory::Light => &self.lights,
            SensorCategory::Illuminance => &self.illuminance,
            SensorCategory::Humidity => &self.humidity,
            SensorCategory::Temperature => &self.temperature,
        }
    }

    /// Every configured entity with its category, in category order
    pub fn iter(&self) -> impl Iterator<Item = (&str, SensorCategory)> + '_ {
        SensorCategory::ALL.into_iter().flat_map(move |category| {
            self.ids_for(category)
                .iter()
                .map(move |id| (id.as_str(), category))
        })
    }

    pub fn all_ids(&self) -> Vec<String> {
        self.iter().map(|(id, _)| id.to_string()).collect()
    }

    pub fn id_set(&self) -> HashSet<String> {
        self.iter().map(|(id, _)| id.to_string()).collect()
    }

    pub fn category_of(&self, entity_id: &str) -> Option<SensorCategory> {
        self.iter()
            .find(|(id, _)| *id == entity_id)
            .map(|(_, category)| category)
    }

    pub fn environmental_ids(&self) -> Vec<String> {
        self.iter()
            .filter(|(_, c)| c.is_environmental())
            .map(|(id, _)| id.to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// DECAY / WEIGHTS / TIMING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    pub enabled: bool,
    pub window_secs: u64,
    pub min_delay_secs: u64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: DEFAULT_DECAY_WINDOW_SECS,
            min_delay_secs: DEFAULT_DECAY_MIN_DELAY_SECS,
        }
    }
}

impl DecayConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// Evidence weight per category, each in [0,1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    pub motion: f64,
    pub media: f64,
    pub appliance: f64,
    pub door: f64,
    pub window: f64,
    pub light: f64,
    pub environmental: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            motion: DEFAULT_WEIGHT_MOTION,
            media: DEFAULT_WEIGHT_MEDIA,
            appliance: DEFAULT_WEIGHT_APPLIANCE,
            door: DEFAULT_WEIGHT_DOOR,
            window: DEFAULT_WEIGHT_WINDOW,
            light: DEFAULT_WEIGHT_LIGHT,
            environmental: DEFAULT_WEIGHT_ENVIRONMENTAL,
        }
    }
}

impl CategoryWeights {
    pub fn get(&self, category: SensorCategory) -> f64 {
        match category {
            SensorCategory::Motion => self.motion,
            SensorCategory::Media => self.media,
            SensorCategory::Appliance => self.appliance,
            SensorCategory::Door => self.door,
            SensorCategory::Window => self.window,
            SensorCategory::Light => self.light,
            SensorCategory::Illuminance
            | SensorCategory::Humidity
            | SensorCategory::Temperature => self.environmental,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub poll_interval_secs: u64,
    pub debounce_ms: u64,
    pub analysis_interval_secs: u64,
    pub save_interval_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            analysis_interval_secs: DEFAULT_ANALYSIS_INTERVAL_SECS,
            save_interval_secs: DEFAULT_SAVE_INTERVAL_SECS,
        }
    }
}

impl TimingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("poll_interval_secs"));
        }
        if self.analysis_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("analysis_interval_secs"));
        }

        let bounds = [
            ("poll_interval_secs", self.poll_interval_secs, MAX_POLL_INTERVAL_SECS),
            ("debounce_ms", self.debounce_ms, MAX_DEBOUNCE_MS),
            ("analysis_interval_secs", self.analysis_interval_secs, MAX_ANALYSIS_INTERVAL_SECS),
            ("save_interval_secs", self.save_interval_secs, MAX_SAVE_INTERVAL_SECS),
        ];
        for (field, value, max) in bounds {
            if value > max {
                return Err(ConfigError::IntervalOutOfRange { field, value, max });
            }
        }
        Ok(())
    }
}

// ============================================================================
// AREA CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaConfig {
    pub area_id: String,
    pub name: String,
    pub sensors: SensorSet,
    pub threshold: OccupancyThreshold,
    pub history_period_days: u32,
    pub decay: DecayConfig,
    pub historical_analysis_enabled: bool,
    pub minimum_confidence: f64,
    pub weights: CategoryWeights,
    pub timing: TimingConfig,
}

impl Default for AreaConfig {
    fn default() -> Self {
        Self {
            area_id: "default".to_string(),
            name: "Area".to_string(),
            sensors: SensorSet::default(),
            threshold: OccupancyThreshold::default(),
            history_period_days: DEFAULT_HISTORY_PERIOD_DAYS,
            decay: DecayConfig::default(),
            historical_analysis_enabled: true,
            minimum_confidence: DEFAULT_MINIMUM_CONFIDENCE,
            weights: CategoryWeights::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl AreaConfig {
    pub fn new(area_id: &str, name: &str, motion: Vec<String>) -> Self {
        Self {
            area_id: area_id.to_string(),
            name: name.to_string(),
            sensors: SensorSet {
                motion,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensors.motion.is_empty() {
            return Err(ConfigError::NoMotionSensors);
        }

        self.threshold.validate()?;

        if self.history_period_days == 0 || self.history_period_days > MAX_HISTORY_PERIOD_DAYS {
            return Err(ConfigError::HistoryPeriodOutOfRange(self.history_period_days));
        }

        if self.decay.window_secs == 0 || self.decay.window_secs > MAX_DECAY_WINDOW_SECS {
            return Err(ConfigError::DecayWindowOutOfRange(self.decay.window_secs));
        }

        if !(0.0..=1.0).contains(&self.minimum_confidence) {
            return Err(ConfigError::MinimumConfidenceOutOfRange(self.minimum_confidence));
        }

        for category in SensorCategory::ALL {
            let weight = self.weights.get(category);
            if !(0.0..=1.0).contains(&weight) {
                return Err(ConfigError::WeightOutOfRange { category, weight });
            }
        }

        let mut seen = HashSet::new();
        for (id, _) in self.sensors.iter() {
            if !seen.insert(id) {
                return Err(ConfigError::DuplicateSensor(id.to_string()));
            }
        }

        self.timing.validate()
    }

    /// Persistence key for this area
    pub fn storage_key(&self) -> String {
        format!("{}.{}.storage", STORAGE_KEY_PREFIX, self.area_id)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn area() -> AreaConfig {
        AreaConfig::new("living", "Living Room", vec!["binary_sensor.motion".into()])
    }

    #[test]
    fn test_default_config() {
        let config = AreaConfig::default();
        assert_eq!(config.threshold.percent(), 50.0);
        assert_eq!(config.history_period_days, 7);
        assert!(config.decay.enabled);
        assert_eq!(config.decay.window_secs, 600);
        assert_eq!(config.decay.min_delay_secs, 60);
        assert_eq!(config.timing.poll_interval_secs, 10);
        assert_eq!(config.timing.debounce_ms, 100);
    }

    #[test]
    fn test_requires_motion_sensor() {
        let config = AreaConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::NoMotionSensors)));
        assert!(area().validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut config = area();
        config.threshold = OccupancyThreshold::new(100.0).unwrap();
        assert!(config.validate().is_ok());

        config.history_period_days = 31;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::HistoryPeriodOutOfRange(31))
        ));

        let mut config = area();
        config.decay.window_secs = 0;
        assert!(config.validate().is_err());

        let mut config = area();
        config.weights.light = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WeightOutOfRange {
                category: SensorCategory::Light,
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_unbounded_intervals() {
        let mut config = area();
        config.timing.save_interval_secs = 10_000_000_000_000_000;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::IntervalOutOfRange {
                field: "save_interval_secs",
                ..
            })
        ));

        let mut config = area();
        config.timing.debounce_ms = u64::MAX;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::IntervalOutOfRange { field: "debounce_ms", .. })
        ));

        let mut config = area();
        config.timing.analysis_interval_secs = MAX_ANALYSIS_INTERVAL_SECS;
        config.timing.poll_interval_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroInterval("poll_interval_secs"))
        ));
        config.timing.poll_interval_secs = MAX_POLL_INTERVAL_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_duplicate_sensor() {
        let mut config = area();
        config.sensors.lights.push("binary_sensor.motion".into());
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateSensor(_))));
    }

    #[test]
    fn test_category_lookup() {
        let mut config = area();
        config.sensors.doors.push("binary_sensor.door".into());
        config.sensors.illuminance.push("sensor.lux".into());

        assert_eq!(
            config.sensors.category_of("binary_sensor.door"),
            Some(SensorCategory::Door)
        );
        assert_eq!(config.sensors.category_of("sensor.unknown"), None);
        assert_eq!(config.sensors.len(), 3);
        assert_eq!(config.sensors.environmental_ids(), vec!["sensor.lux".to_string()]);
    }

    #[test]
    fn test_json_partial_uses_defaults() {
        let config: AreaConfig = serde_json::from_str(
            r#"{"area_id":"office","sensors":{"motion":["binary_sensor.pir"]},"threshold":65}"#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.threshold.percent(), 65.0);
        assert_eq!(config.weights.motion, 0.85);
        assert_eq!(config.storage_key(), "area_occupancy.office.storage");
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("area.json");
        std::fs::write(&path, serde_json::to_vec_pretty(&area()).unwrap()).unwrap();

        let loaded = AreaConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, area());
    }
}
