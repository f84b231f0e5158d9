//! Sensor Views - host-facing presentation of the latest result
//!
//! Each view reports a value, an attribute map and availability. Percentages
//! are rounded to two decimals.

use serde_json::{json, Map, Value};

use crate::constants::APP_NAME;
use crate::logic::calculator::ProbabilityResult;
use crate::logic::config::AreaConfig;
use crate::logic::coordinator::OccupancyCoordinator;
use crate::logic::sensors::SensorCategory;

pub trait SensorView {
    fn unique_id(&self) -> String;
    fn value(&self) -> Option<Value>;
    fn attributes(&self) -> Map<String, Value>;
    fn available(&self) -> bool;
}

fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 100.0).round() / 100.0
}

fn percent(value: f64) -> f64 {
    round2(value * 100.0)
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// What every view reads, captured once per render
#[derive(Debug, Clone)]
pub struct ViewContext {
    pub config: AreaConfig,
    pub result: Option<ProbabilityResult>,
    pub last_update_success: bool,
}

impl ViewContext {
    pub fn capture(coordinator: &OccupancyCoordinator) -> Self {
        Self {
            config: coordinator.config(),
            result: coordinator.result(),
            last_update_success: coordinator.last_update_success(),
        }
    }

    fn unique_id(&self, suffix: &str) -> String {
        format!("{}_{}_{}", APP_NAME.replace('-', "_"), self.config.area_id, suffix)
    }

    /// Needs a good last cycle and at least one live motion sensor
    fn available(&self) -> bool {
        let Some(result) = self.result.as_ref().filter(|_| self.last_update_success) else {
            return false;
        };
        self.config
            .sensors
            .motion
            .iter()
            .any(|id| result.sensor_availability.get(id).copied().unwrap_or(false))
    }

    fn shared_attributes(&self) -> Map<String, Value> {
        let Some(result) = &self.result else {
            return Map::new();
        };

        let sensor_probabilities: Map<String, Value> = result
            .sensor_probabilities
            .iter()
            .map(|(id, p)| (id.clone(), json!(percent(*p))))
            .collect();
        let decay_status: Map<String, Value> = result
            .decay_status
            .iter()
            .map(|(k, v)| (k.clone(), json!(percent(*v))))
            .collect();

        let mut attrs = Map::new();
        attrs.insert("probability".into(), json!(percent(result.probability)));
        attrs.insert("prior_probability".into(), json!(percent(result.prior_probability)));
        attrs.insert("active_triggers".into(), json!(result.active_triggers));
        attrs.insert("sensor_probabilities".into(), Value::Object(sensor_probabilities));
        attrs.insert("decay_status".into(), Value::Object(decay_status));
        attrs.insert("confidence_score".into(), json!(percent(result.confidence_score)));
        attrs.insert("sensor_availability".into(), json!(result.sensor_availability));
        attrs.insert("configured_sensors".into(), json!(self.config.sensors));
        attrs
    }
}

// ============================================================================
// VIEWS
// ============================================================================

/// Occupancy probability in percent
pub struct ProbabilitySensor<'a> {
    ctx: &'a ViewContext,
}

impl<'a> ProbabilitySensor<'a> {
    pub fn new(ctx: &'a ViewContext) -> Self {
        Self { ctx }
    }
}

impl SensorView for ProbabilitySensor<'_> {
    fn unique_id(&self) -> String {
        self.ctx.unique_id("probability")
    }

    fn value(&self) -> Option<Value> {
        self.ctx.result.as_ref().map(|r| json!(percent(r.probability)))
    }

    fn attributes(&self) -> Map<String, Value> {
        let mut attrs = self.ctx.shared_attributes();
        if let Some(metrics) = self.ctx.result.as_ref().and_then(|r| r.metrics.as_ref()) {
            attrs.insert("moving_average".into(), json!(percent(metrics.moving_average)));
            attrs.insert("rate_of_change".into(), json!(percent(metrics.rate_of_change)));
            attrs.insert("min_probability".into(), json!(percent(metrics.min_probability)));
            attrs.insert("max_probability".into(), json!(percent(metrics.max_probability)));
        }
        attrs
    }

    fn available(&self) -> bool {
        self.ctx.available()
    }
}

/// Occupied / clear, judged against the configured threshold
pub struct OccupancyStatusSensor<'a> {
    ctx: &'a ViewContext,
}

impl<'a> OccupancyStatusSensor<'a> {
    pub fn new(ctx: &'a ViewContext) -> Self {
        Self { ctx }
    }
}

impl SensorView for OccupancyStatusSensor<'_> {
    fn unique_id(&self) -> String {
        self.ctx.unique_id("occupancy")
    }

    fn value(&self) -> Option<Value> {
        self.ctx.result.as_ref().map(|r| json!(r.is_occupied))
    }

    fn attributes(&self) -> Map<String, Value> {
        let mut attrs = self.ctx.shared_attributes();
        attrs.insert(
            "threshold".into(),
            json!(round2(self.ctx.config.threshold.percent())),
        );
        if let Some(metrics) = self.ctx.result.as_ref().and_then(|r| r.metrics.as_ref()) {
            attrs.insert("last_occupied".into(), json!(metrics.last_occupied));
            // minutes
            attrs.insert(
                "state_duration".into(),
                json!(round2(metrics.state_duration_secs / 60.0)),
            );
            attrs.insert("occupancy_rate".into(), json!(percent(metrics.occupancy_rate)));
        }
        attrs
    }

    fn available(&self) -> bool {
        self.ctx.available()
    }
}

/// Mean resolved prior across one category's available sensors
pub struct PriorSensor<'a> {
    ctx: &'a ViewContext,
    category: SensorCategory,
}

impl<'a> PriorSensor<'a> {
    pub fn new(ctx: &'a ViewContext, category: SensorCategory) -> Self {
        Self { ctx, category }
    }

    fn means(&self) -> Option<(f64, f64, f64)> {
        let result = self.ctx.result.as_ref()?;
        let priors: Vec<_> = self
            .ctx
            .config
            .sensors
            .ids_for(self.category)
            .iter()
            .filter_map(|id| result.sensor_priors.get(id))
            .collect();
        if priors.is_empty() {
            return None;
        }
        let n = priors.len() as f64;
        Some((
            priors.iter().map(|p| p.prior).sum::<f64>() / n,
            priors.iter().map(|p| p.prob_given_true).sum::<f64>() / n,
            priors.iter().map(|p| p.prob_given_false).sum::<f64>() / n,
        ))
    }
}

impl SensorView for PriorSensor<'_> {
    fn unique_id(&self) -> String {
        self.ctx.unique_id(&format!("{}_prior", self.category.as_str()))
    }

    fn value(&self) -> Option<Value> {
        self.means().map(|(prior, _, _)| json!(percent(prior)))
    }

    fn attributes(&self) -> Map<String, Value> {
        let mut attrs = Map::new();
        attrs.insert("category".into(), json!(self.category.as_str()));
        if let Some((_, p_true, p_false)) = self.means() {
            attrs.insert("prob_given_true".into(), json!(percent(p_true)));
            attrs.insert("prob_given_false".into(), json!(percent(p_false)));
        }
        attrs.insert(
            "entities".into(),
            json!(self.ctx.config.sensors.ids_for(self.category)),
        );
        attrs
    }

    fn available(&self) -> bool {
        self.means().is_some()
    }
}

/// Probability and status views plus one prior view per configured category
pub fn views(ctx: &ViewContext) -> Vec<Box<dyn SensorView + '_>> {
    let mut views: Vec<Box<dyn SensorView + '_>> = vec![
        Box::new(ProbabilitySensor::new(ctx)),
        Box::new(OccupancyStatusSensor::new(ctx)),
    ];
    for category in SensorCategory::ALL {
        if !ctx.config.sensors.ids_for(category).is_empty() {
            views.push(Box::new(PriorSensor::new(ctx, category)));
        }
    }
    views
}

/// Flat `{unique_id: {value, available, attributes}}` rendering
pub fn render(ctx: &ViewContext) -> Value {
    let rendered: Map<String, Value> = views(ctx)
        .into_iter()
        .map(|view| {
            (
                view.unique_id(),
                json!({
                    "value": view.value(),
                    "available": view.available(),
                    "attributes": view.attributes(),
                }),
            )
        })
        .collect();
    Value::Object(rendered)
}
