//! Area Occupancy - Bayesian occupancy engine
//!
//! Infers how likely a space is occupied from motion, media, appliance,
//! door, window, light and environmental sensors, learning per-sensor
//! likelihoods from recorded history.

pub mod api;
pub mod constants;
pub mod logic;

pub use logic::calculator::ProbabilityResult;
pub use logic::config::AreaConfig;
pub use logic::coordinator::{LifecycleState, OccupancyCoordinator};
pub use logic::error::CoordinatorError;
