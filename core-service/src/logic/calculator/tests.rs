use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::*;
use crate::constants::{MAX_PROBABILITY, MIN_PROBABILITY};
use crate::logic::config::AreaConfig;
use crate::logic::history::{EnvironmentalBaselines, SlotLikelihood, TimeslotEntry};
use crate::logic::host::HostState;
use crate::logic::priors::{LearnedPrior, PriorSource, PriorStore, PriorTriple};
use crate::logic::sensors::{SensorObservation, SensorStateStore};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 20, 0, 0).unwrap()
}

fn config() -> AreaConfig {
    let mut config = AreaConfig::new(
        "living",
        "Living Room",
        vec!["binary_sensor.m1".into(), "binary_sensor.m2".into()],
    );
    config.sensors.media.push("media_player.tv".into());
    config.sensors.doors.push("binary_sensor.door".into());
    config.sensors.illuminance.push("sensor.lux".into());
    config
}

fn states(values: &[(&str, &str)]) -> SensorStateStore {
    let cfg = config();
    let mut store = SensorStateStore::new();
    for (id, value) in values {
        let obs = SensorObservation::from_host(id, Some(&HostState::new(*value, now())), now());
        let category = cfg.sensors.category_of(id).unwrap();
        store.apply(obs, category, now());
    }
    store
}

fn quiet_states() -> SensorStateStore {
    states(&[
        ("binary_sensor.m1", "off"),
        ("binary_sensor.m2", "off"),
        ("media_player.tv", "idle"),
        ("binary_sensor.door", "open"),
        ("sensor.lux", "40"),
    ])
}

struct Fixture {
    priors: PriorStore,
    baselines: EnvironmentalBaselines,
    decay: DecayState,
}

impl Fixture {
    fn new() -> Self {
        Self {
            priors: PriorStore::new(),
            baselines: EnvironmentalBaselines::default(),
            decay: DecayState::new(&config().decay),
        }
    }

    fn run(
        &self,
        config: &AreaConfig,
        states: &SensorStateStore,
        timeslot: Option<&TimeslotEntry>,
        previous: Option<f64>,
        at: DateTime<Utc>,
    ) -> Calculation {
        ProbabilityCalculator::new(config)
            .calculate(CalculationInput {
                states,
                priors: &self.priors,
                timeslot,
                baselines: &self.baselines,
                decay: &self.decay,
                previous_probability: previous,
                now: at,
            })
            .unwrap()
    }
}

#[test]
fn test_motion_on_raises_probability() {
    let fx = Fixture::new();
    let cfg = config();
    let mut st = quiet_states();
    st.apply(
        SensorObservation::from_host("binary_sensor.m1", Some(&HostState::new("on", now())), now()),
        crate::logic::sensors::SensorCategory::Motion,
        now(),
    );

    let calc = fx.run(&cfg, &st, None, Some(0.3), now());
    let result = &calc.result;

    // 0.22 * 0.3 / (0.22 * 0.3 + 0.05 * 0.7)
    assert!((result.probability - 0.066 / 0.101).abs() < 1e-9);
    assert!(result.probability >= 0.3);
    assert_eq!(result.active_triggers, vec!["binary_sensor.m1".to_string()]);
    assert!(result.is_occupied);
    assert_eq!(result.global_decay(), 0.0);
    assert_eq!(calc.decay.last_positive_trigger, Some(now()));
    assert_eq!(calc.decay.peak_probability, Some(result.probability));
}

#[test]
fn test_threshold_governs_occupied_flag() {
    let fx = Fixture::new();
    let mut cfg = config();
    cfg.threshold = crate::logic::model::OccupancyThreshold::new(70.0).unwrap();
    let st = states(&[("binary_sensor.m1", "on")]);

    let result = fx.run(&cfg, &st, None, Some(0.3), now()).result;
    assert!(result.probability < 0.7);
    assert!(!result.is_occupied);
    assert_eq!(result.threshold, 0.7);
}

#[test]
fn test_all_unavailable() {
    let fx = Fixture::new();
    let cfg = config();
    let st = states(&[
        ("binary_sensor.m1", "unavailable"),
        ("binary_sensor.m2", "unknown"),
    ]);

    let result = fx.run(&cfg, &st, None, Some(0.8), now()).result;
    assert!(!result.is_occupied);
    assert_eq!(result.confidence_score, 0.0);
    assert!(result.active_triggers.is_empty());
    assert!(result.sensor_availability.values().all(|a| !a));
    assert_eq!(result.sensor_availability.len(), 5);
    assert_eq!(result.prior_probability, crate::constants::DEFAULT_PRIOR);
}

#[test]
fn test_decay_at_half_window() {
    let mut fx = Fixture::new();
    fx.decay = fx.decay.triggered(now() - Duration::seconds(300), 0.9);
    let cfg = config();

    let result = fx.run(&cfg, &quiet_states(), None, Some(0.9), now()).result;
    assert!((result.probability - 0.9 * 0.648).abs() < 0.001);
    assert!((result.global_decay() - 0.352).abs() < 0.001);
}

#[test]
fn test_idempotent_without_evidence() {
    let fx = Fixture::new();
    let cfg = config();
    let st = quiet_states();

    let first = fx.run(&cfg, &st, None, Some(0.42), now()).result;
    let second = fx.run(&cfg, &st, None, Some(first.probability), now()).result;
    assert_eq!(first.probability, 0.42);
    assert_eq!(second.probability, first.probability);
    assert_eq!(first.confidence_score, 1.0);
}

#[test]
fn test_door_closed_triggers() {
    let fx = Fixture::new();
    let cfg = config();
    let st = states(&[("binary_sensor.door", "closed")]);

    let result = fx.run(&cfg, &st, None, None, now()).result;
    assert_eq!(result.active_triggers, vec!["binary_sensor.door".to_string()]);
    assert!(result.probability > crate::constants::DEFAULT_PRIOR);
}

#[test]
fn test_environmental_needs_baseline() {
    let mut fx = Fixture::new();
    let cfg = config();
    let st = states(&[("sensor.lux", "300")]);

    let without = fx.run(&cfg, &st, None, None, now()).result;
    assert!(without.active_triggers.is_empty());

    fx.baselines.insert("sensor.lux", 120.0);
    let with = fx.run(&cfg, &st, None, None, now()).result;
    assert_eq!(with.active_triggers, vec!["sensor.lux".to_string()]);
}

#[test]
fn test_prior_resolution_order() {
    let mut fx = Fixture::new();
    let learned_at = now() - Duration::hours(2);
    fx.priors.record(LearnedPrior::new(
        "binary_sensor.m1",
        PriorTriple::new(0.8, 0.1, 0.4),
        PriorSource::History,
        learned_at,
    ));
    let slot = TimeslotEntry {
        entities: BTreeMap::from([(
            "media_player.tv".to_string(),
            SlotLikelihood {
                prob_given_true: 0.6,
                prob_given_false: 0.05,
                samples: 7,
            },
        )]),
        combined_prob_given_true: Some(0.6),
        combined_prob_given_false: Some(0.05),
    };
    let cfg = config();

    let calc = fx.run(&cfg, &quiet_states(), Some(&slot), None, now());
    let priors = &calc.result.sensor_priors;

    assert_eq!(priors["binary_sensor.m1"].source, PriorSource::History);
    assert_eq!(priors["binary_sensor.m1"].prob_given_true, 0.8);
    assert_eq!(priors["media_player.tv"].source, PriorSource::Timeslot);
    assert_eq!(priors["media_player.tv"].prob_given_true, 0.6);
    assert_eq!(priors["media_player.tv"].prior, 0.30);
    assert_eq!(priors["binary_sensor.door"].source, PriorSource::Default);

    // Learned entries are fed back untouched
    let m1 = calc
        .prior_updates
        .iter()
        .find(|p| p.entity_id == "binary_sensor.m1")
        .unwrap();
    assert_eq!(m1.last_updated, learned_at);
    assert_eq!(calc.prior_updates.len(), 5);
}

#[test]
fn test_zero_weight_is_neutral() {
    let fx = Fixture::new();
    let mut cfg = config();
    cfg.weights.motion = 0.0;
    let st = states(&[("binary_sensor.m1", "on")]);

    let result = fx.run(&cfg, &st, None, Some(0.3), now()).result;
    assert!((result.probability - 0.3).abs() < 1e-9);
}

#[test]
fn test_probabilities_stay_clamped() {
    let mut fx = Fixture::new();
    for id in ["binary_sensor.m1", "binary_sensor.m2", "media_player.tv", "binary_sensor.door"] {
        fx.priors.record(LearnedPrior::new(
            id,
            PriorTriple::new(0.99, 0.01, 0.9),
            PriorSource::History,
            now(),
        ));
    }
    let mut cfg = config();
    cfg.weights.door = 1.0;
    let st = states(&[
        ("binary_sensor.m1", "on"),
        ("binary_sensor.m2", "on"),
        ("media_player.tv", "playing"),
        ("binary_sensor.door", "closed"),
    ]);

    let result = fx.run(&cfg, &st, None, Some(0.99), now()).result;
    assert!(result.probability <= MAX_PROBABILITY);
    for p in result.sensor_probabilities.values() {
        assert!((MIN_PROBABILITY..=MAX_PROBABILITY).contains(p));
    }
    assert!(result.prior_probability <= MAX_PROBABILITY);
}

#[test]
fn test_non_finite_previous_fails() {
    let fx = Fixture::new();
    let cfg = config();
    let err = ProbabilityCalculator::new(&cfg)
        .calculate(CalculationInput {
            states: &quiet_states(),
            priors: &fx.priors,
            timeslot: None,
            baselines: &fx.baselines,
            decay: &fx.decay,
            previous_probability: Some(f64::NAN),
            now: now(),
        })
        .unwrap_err();
    assert!(matches!(err, crate::logic::error::CalculationError::InvalidPrevious(_)));
}

#[test]
fn test_minimal_result() {
    let availability = BTreeMap::from([("a".to_string(), true), ("b".to_string(), false)]);
    let result = ProbabilityResult::minimal(availability, 0.5, now());
    assert_eq!(result.probability, MIN_PROBABILITY);
    assert!(!result.is_occupied);
    assert_eq!(result.confidence_score, 0.5);
}
