//! Sensors - categories, activity predicates and the live state store

pub mod category;
pub mod store;

pub use category::{CategoryDefaults, SensorCategory};
pub use store::{SensorObservation, SensorStateStore};
