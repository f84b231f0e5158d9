//! Error taxonomy
//!
//! - `ConfigError`: fatal at setup, reported to the host
//! - `HistoryError` / `StorageError`: transient I/O, callers degrade to defaults
//! - `CalculationError`: a cycle failed, last-known-good result is kept
//! - `CoordinatorError`: what the host-facing surface returns

use thiserror::Error;

use crate::logic::sensors::SensorCategory;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no motion sensors configured")]
    NoMotionSensors,

    #[error("threshold {0} outside 0..=100")]
    ThresholdOutOfRange(f64),

    #[error("decay window {0}s outside 1..={max}s", max = crate::constants::MAX_DECAY_WINDOW_SECS)]
    DecayWindowOutOfRange(u64),

    #[error("history period {0} days outside 1..={max}", max = crate::constants::MAX_HISTORY_PERIOD_DAYS)]
    HistoryPeriodOutOfRange(u32),

    #[error("minimum confidence {0} outside 0..=1")]
    MinimumConfidenceOutOfRange(f64),

    #[error("weight {weight} for {category} outside 0..=1")]
    WeightOutOfRange { category: SensorCategory, weight: f64 },

    #[error("sensor {0} configured more than once")]
    DuplicateSensor(String),

    #[error("interval `{0}` must be non-zero")]
    ZeroInterval(&'static str),

    #[error("interval `{field}` = {value} exceeds {max}")]
    IntervalOutOfRange { field: &'static str, value: u64, max: u64 },

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("config read error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history store unavailable: {0}")]
    Unavailable(String),

    #[error("history query failed: {0}")]
    Query(String),

    #[error("history database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("history worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("stored schema v{found} is newer than supported v{supported}")]
    UnsupportedVersion { found: u64, supported: u32 },

    #[error("invalid stored data: {0}")]
    InvalidFormat(String),

    #[error("storage worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Error)]
pub enum CalculationError {
    #[error("threshold unavailable or not finite: {0}")]
    InvalidThreshold(f64),

    #[error("previous probability not finite: {0}")]
    InvalidPrevious(f64),
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("update failed: {0}")]
    UpdateFailed(#[from] CalculationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    History(#[from] HistoryError),
}
