//! History - learning from recorded state changes
//!
//! - `intervals`: timeline reconstruction and interval algebra
//! - `analyzer`: conditional probabilities, timeslot cache, analysis runs
//! - `environment`: numeric baselines for environmental sensors
//! - `correlation` / `patterns`: diagnostics

pub mod analyzer;
pub mod correlation;
pub mod environment;
pub mod intervals;
pub mod patterns;
pub mod timeslots;


pub use analyzer::{AnalysisInsights, AnalysisOutput, HistoricalAnalyzer, PriorEstimate};
pub use environment::EnvironmentalBaselines;
pub use timeslots::{SlotLikelihood, TimeslotCache, TimeslotEntry, TimeslotKey};
