//! Model Module - value types shared by the calculator and coordinator
//!
//! - `threshold` - occupancy threshold (percent in, decimal out)
//! - `buffer` - fixed-capacity circular sample buffer

pub mod buffer;
pub mod threshold;

pub use buffer::RingBuffer;
pub use threshold::OccupancyThreshold;
