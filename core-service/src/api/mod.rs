//! API Module - host-facing surface
//!
//! - `commands` - async commands plus a JSON command envelope
//! - `sensors` - value/attribute views over the latest result

pub mod commands;
pub mod sensors;

pub use commands::{execute, execute_json, AreaStatus, Command};
pub use sensors::{SensorView, ViewContext};
