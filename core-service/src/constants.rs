//! Central Configuration Constants
//!
//! Single source of truth for probability bounds, per-category defaults,
//! coordinator timing and storage schema versions.

use std::path::PathBuf;

// ============================================================================
// PROBABILITY BOUNDS
// ============================================================================

/// Lower clamp for every stored or returned probability
pub const MIN_PROBABILITY: f64 = 0.01;

/// Upper clamp for every stored or returned probability
pub const MAX_PROBABILITY: f64 = 0.99;

/// Global starting prior when no previous result exists
pub const DEFAULT_PRIOR: f64 = 0.1713;

/// Fallback likelihoods when history cannot be learned
pub const DEFAULT_PROB_GIVEN_TRUE: f64 = 0.3;
pub const DEFAULT_PROB_GIVEN_FALSE: f64 = 0.02;

// ============================================================================
// CATEGORY DEFAULTS
// ============================================================================

pub const MOTION_PROB_GIVEN_TRUE: f64 = 0.25;
pub const MOTION_PROB_GIVEN_FALSE: f64 = 0.05;
pub const MOTION_DEFAULT_PRIOR: f64 = 0.35;

pub const MEDIA_PROB_GIVEN_TRUE: f64 = 0.25;
pub const MEDIA_PROB_GIVEN_FALSE: f64 = 0.02;
pub const MEDIA_DEFAULT_PRIOR: f64 = 0.30;

pub const APPLIANCE_PROB_GIVEN_TRUE: f64 = 0.2;
pub const APPLIANCE_PROB_GIVEN_FALSE: f64 = 0.02;
pub const APPLIANCE_DEFAULT_PRIOR: f64 = 0.2356;

pub const DOOR_PROB_GIVEN_TRUE: f64 = 0.2;
pub const DOOR_PROB_GIVEN_FALSE: f64 = 0.02;
pub const DOOR_DEFAULT_PRIOR: f64 = 0.1356;

pub const WINDOW_PROB_GIVEN_TRUE: f64 = 0.2;
pub const WINDOW_PROB_GIVEN_FALSE: f64 = 0.02;
pub const WINDOW_DEFAULT_PRIOR: f64 = 0.1569;

pub const LIGHT_PROB_GIVEN_TRUE: f64 = 0.2;
pub const LIGHT_PROB_GIVEN_FALSE: f64 = 0.02;
pub const LIGHT_DEFAULT_PRIOR: f64 = 0.3846;

pub const ENVIRONMENTAL_PROB_GIVEN_TRUE: f64 = 0.09;
pub const ENVIRONMENTAL_PROB_GIVEN_FALSE: f64 = 0.01;
pub const ENVIRONMENTAL_DEFAULT_PRIOR: f64 = 0.0769;

// Evidence weights (0 = ignored, 1 = raw likelihood)
pub const DEFAULT_WEIGHT_MOTION: f64 = 0.85;
pub const DEFAULT_WEIGHT_MEDIA: f64 = 0.7;
pub const DEFAULT_WEIGHT_APPLIANCE: f64 = 0.3;
pub const DEFAULT_WEIGHT_DOOR: f64 = 0.3;
pub const DEFAULT_WEIGHT_WINDOW: f64 = 0.2;
pub const DEFAULT_WEIGHT_LIGHT: f64 = 0.2;
pub const DEFAULT_WEIGHT_ENVIRONMENTAL: f64 = 0.1;

/// Environmental sensor is "active" above mean + 5% of observed range
pub const ENVIRONMENTAL_BASELINE_PERCENT: f64 = 0.05;

// ============================================================================
// DECAY
// ============================================================================

/// exp(-DECAY_LAMBDA * 0.5) ~= 0.648 at half the decay window
pub const DECAY_LAMBDA: f64 = 0.866433975;

pub const DEFAULT_DECAY_WINDOW_SECS: u64 = 600;
pub const DEFAULT_DECAY_MIN_DELAY_SECS: u64 = 60;
pub const MAX_DECAY_WINDOW_SECS: u64 = 24 * 3600;

// ============================================================================
// HISTORY / ANALYSIS
// ============================================================================

pub const DEFAULT_HISTORY_PERIOD_DAYS: u32 = 7;
pub const MAX_HISTORY_PERIOD_DAYS: u32 = 30;

pub const TIMESLOT_MINUTES: u32 = 30;
pub const TIMESLOTS_PER_DAY: usize = 48;

/// Pairwise correlations at or below this are dropped
pub const CORRELATION_THRESHOLD: f64 = 0.3;

// ============================================================================
// COORDINATOR
// ============================================================================

pub const DEFAULT_THRESHOLD_PERCENT: f64 = 50.0;
pub const DEFAULT_MINIMUM_CONFIDENCE: f64 = 0.3;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;
pub const DEFAULT_ANALYSIS_INTERVAL_SECS: u64 = 6 * 3600;
pub const DEFAULT_SAVE_INTERVAL_SECS: u64 = 5 * 60;

/// Upper bounds accepted by config validation
pub const MAX_POLL_INTERVAL_SECS: u64 = 3600;
pub const MAX_DEBOUNCE_MS: u64 = 60_000;
pub const MAX_ANALYSIS_INTERVAL_SECS: u64 = 7 * 24 * 3600;
pub const MAX_SAVE_INTERVAL_SECS: u64 = 24 * 3600;

/// Smoothing window (probability samples)
pub const PROBABILITY_HISTORY_LEN: usize = 12;

/// Occupancy-rate window (~24h at 5-minute cadence)
pub const OCCUPANCY_HISTORY_LEN: usize = 288;

// ============================================================================
// STORAGE
// ============================================================================

pub const STORAGE_VERSION: u32 = 2;
pub const STORAGE_VERSION_MINOR: u32 = 1;
pub const STORAGE_KEY_PREFIX: &str = "area_occupancy";

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "area-occupancy";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Area config JSON path (`AREA_OCCUPANCY_CONFIG`)
pub fn get_config_path() -> Option<PathBuf> {
    std::env::var("AREA_OCCUPANCY_CONFIG").ok().map(PathBuf::from)
}

/// SQLite history database (`AREA_OCCUPANCY_HISTORY_DB`)
pub fn get_history_db() -> Option<PathBuf> {
    std::env::var("AREA_OCCUPANCY_HISTORY_DB").ok().map(PathBuf::from)
}

/// Storage directory from environment or the platform data dir
pub fn get_storage_dir() -> PathBuf {
    std::env::var("AREA_OCCUPANCY_STORAGE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_NAME)
        })
}
