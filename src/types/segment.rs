//! Stream segment types for the drainage network.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

use super::basin::BasinId;

/// Unique identifier for a stream segment.
///
/// Wraps the integer link number carried by the source dataset and
/// implements `Ord` so worklists and exports iterate deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(i64);

impl SegmentId {
    /// Create a new SegmentId from a link number.
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Get the raw link number.
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SegmentId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// A directed reach of the drainage network.
///
/// Linkage is stored as ids, never as references: the owning
/// [`NetworkGraph`](crate::store::NetworkGraph) keeps `upstream_ids` and
/// `downstream_id` symmetric across all segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Segment identifier.
    pub id: SegmentId,
    /// Geometric length in network units (meters for TDX-Hydro).
    pub length: f64,
    /// Segments whose downstream is this segment.
    pub upstream_ids: BTreeSet<SegmentId>,
    /// Next segment downstream; `None` marks an outlet.
    pub downstream_id: Option<SegmentId>,
    /// Associated drainage basin, if any.
    pub basin_id: Option<BasinId>,
    /// Source attributes carried through to the writer untouched.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
    /// Source geometry, opaque to the repair engine.
    #[serde(default)]
    pub geometry: Value,
}

impl Segment {
    /// Create a segment with no linkage, basin or attributes.
    pub fn new(id: SegmentId, length: f64) -> Self {
        Self {
            id,
            length,
            upstream_ids: BTreeSet::new(),
            downstream_id: None,
            basin_id: None,
            properties: Map::new(),
            geometry: Value::Null,
        }
    }

    /// Set the downstream link (builder style).
    ///
    /// Only the forward link is recorded here; the graph fills in the
    /// matching `upstream_ids` entry when the segment is linked.
    pub fn with_downstream(mut self, downstream: SegmentId) -> Self {
        self.downstream_id = Some(downstream);
        self
    }

    /// Attach source attributes (builder style).
    pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties = properties;
        self
    }

    /// Attach source geometry (builder style).
    pub fn with_geometry(mut self, geometry: Value) -> Self {
        self.geometry = geometry;
        self
    }

    /// Whether the segment is degenerate.
    pub fn is_zero_length(&self) -> bool {
        self.length == 0.0
    }

    /// Whether the segment has no downstream connection.
    pub fn is_outlet(&self) -> bool {
        self.downstream_id.is_none()
    }

    /// Whether no segment drains into this one.
    pub fn is_headwater(&self) -> bool {
        self.upstream_ids.is_empty()
    }

    /// Capture the connectivity of this segment for auditing.
    pub fn snapshot(&self) -> ConnectivitySnapshot {
        ConnectivitySnapshot {
            length: self.length,
            upstream_ids: self.upstream_ids.clone(),
            downstream_id: self.downstream_id,
            basin_id: self.basin_id,
        }
    }
}

/// Raw connectivity of a segment at classification time.
///
/// Recorded in the report for segments the engine refuses to repair, so an
/// operator can see exactly what topology was encountered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivitySnapshot {
    /// Length at classification time.
    pub length: f64,
    /// Upstream neighbors at classification time.
    pub upstream_ids: BTreeSet<SegmentId>,
    /// Downstream neighbor at classification time.
    pub downstream_id: Option<SegmentId>,
    /// Basin at classification time.
    pub basin_id: Option<BasinId>,
}
