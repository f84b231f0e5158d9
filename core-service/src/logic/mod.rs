//! Logic Module - occupancy engines
//!
//! - `calculator/` - Bayesian update and decay
//! - `history/` - interval reconstruction, prior learning, timeslots
//! - `coordinator/` - lifecycle, scheduling, persistence
//! - `host/` - narrow interfaces into the host plus local adapters

pub mod calculator;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod history;
pub mod host;
pub mod model;
pub mod priors;
pub mod sensors;
pub mod storage;
