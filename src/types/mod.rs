//! Core types for the drainage network.

pub mod segment;
pub mod basin;

pub use segment::{SegmentId, Segment, ConnectivitySnapshot};
pub use basin::{BasinId, Basin};
