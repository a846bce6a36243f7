//! Network storage.
//!
//! The classifier reads the network through [`NetworkView`]; only the
//! repair engine holds the concrete [`NetworkGraph`] mutably.

pub mod memory;

use std::collections::BTreeSet;

use crate::types::{Basin, BasinId, Segment, SegmentId};

/// Error type for network graph operations.
///
/// Every variant signals an inconsistent input graph or a caller bug.
/// None of them is raised by a normal repair pass over a valid network.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// Segment id absent from the graph.
    #[error("Segment not found: {0}")]
    SegmentNotFound(SegmentId),
    /// Basin id absent from the graph.
    #[error("Basin not found: {0}")]
    BasinNotFound(BasinId),
    /// Segment id inserted twice.
    #[error("Duplicate segment: {0}")]
    DuplicateSegment(SegmentId),
    /// Segment already has a basin.
    #[error("Segment {0} already has a basin")]
    DuplicateBasin(SegmentId),
    /// Downstream link names a missing segment or the segment itself.
    #[error("Segment {segment} links downstream to invalid segment {downstream}")]
    InvalidDownstream {
        /// Segment carrying the link.
        segment: SegmentId,
        /// Target of the link.
        downstream: SegmentId,
    },
    /// Upstream/downstream linkage is not symmetric.
    #[error("Asymmetric link between segment {segment} and {neighbor}")]
    AsymmetricLink {
        /// Segment being inspected.
        segment: SegmentId,
        /// Neighbor whose back-reference is missing.
        neighbor: SegmentId,
    },
    /// Negative or non-finite length.
    #[error("Invalid length {value} for segment {segment}")]
    InvalidLength {
        /// Segment being updated.
        segment: SegmentId,
        /// Rejected value.
        value: f64,
    },
}

/// Read access to a drainage network.
///
/// Implementations must return `zero_length_ids` in ascending id order.
pub trait NetworkView {
    /// Fetch a segment by id.
    fn get_segment(&self, id: SegmentId) -> Result<&Segment, GraphError>;

    /// Fetch the basin draining into a segment, if any.
    fn basin_of(&self, id: SegmentId) -> Option<&Basin>;

    /// Ids of all segments with zero length, ascending.
    fn zero_length_ids(&self) -> Vec<SegmentId>;

    /// Whether the segment exists.
    fn contains_segment(&self, id: SegmentId) -> bool {
        self.get_segment(id).is_ok()
    }

    /// Segments draining directly into `id`.
    fn upstream_of(&self, id: SegmentId) -> Result<&BTreeSet<SegmentId>, GraphError> {
        Ok(&self.get_segment(id)?.upstream_ids)
    }

    /// Segment `id` drains into, if any.
    fn downstream_of(&self, id: SegmentId) -> Result<Option<SegmentId>, GraphError> {
        Ok(self.get_segment(id)?.downstream_id)
    }
}

pub use memory::{DeletedSegment, NetworkGraph};
