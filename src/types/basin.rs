//! Drainage basin types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::segment::SegmentId;

/// Unique identifier for a drainage basin.
///
/// Basins share their key with the segment they drain into, so a basin id
/// carries the same raw value as its segment's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BasinId(i64);

impl BasinId {
    /// Create a new BasinId from a raw key.
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Get the raw key.
    pub fn get(&self) -> i64 {
        self.0
    }

    /// The basin id keyed to a segment.
    pub fn for_segment(segment: SegmentId) -> Self {
        Self(segment.get())
    }
}

impl fmt::Display for BasinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Polygon of terrain draining into exactly one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Basin {
    /// Basin identifier.
    pub id: BasinId,
    /// Segment this basin drains into.
    pub segment_id: SegmentId,
    /// Area, when the source dataset carries one.
    pub area: Option<f64>,
    /// Zero-area placeholder created by a confluence repair.
    #[serde(default)]
    pub synthetic: bool,
    /// Source attributes carried through to the writer untouched.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
    /// Source geometry; `Null` for synthetic basins.
    #[serde(default)]
    pub geometry: Value,
}

impl Basin {
    /// Create a basin loaded from source data.
    pub fn new(segment_id: SegmentId, area: Option<f64>) -> Self {
        Self {
            id: BasinId::for_segment(segment_id),
            segment_id,
            area,
            synthetic: false,
            properties: Map::new(),
            geometry: Value::Null,
        }
    }

    /// Create a zero-area placeholder basin for a segment.
    pub fn synthetic(segment_id: SegmentId) -> Self {
        Self {
            id: BasinId::for_segment(segment_id),
            segment_id,
            area: Some(0.0),
            synthetic: true,
            properties: Map::new(),
            geometry: Value::Null,
        }
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
}
