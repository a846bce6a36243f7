//! In-memory network graph.

use std::collections::{BTreeSet, HashMap};

use crate::types::{Basin, BasinId, Segment, SegmentId};
use super::{GraphError, NetworkView};

/// Result of deleting a segment from the graph.
#[derive(Debug, Clone)]
pub struct DeletedSegment {
    /// The removed segment, as it was before rewiring.
    pub segment: Segment,
    /// The removed basin, if the segment had one.
    pub basin: Option<Basin>,
    /// Former upstream neighbors; each is now an outlet.
    pub former_upstream: BTreeSet<SegmentId>,
    /// Former downstream neighbor.
    pub former_downstream: Option<SegmentId>,
}

/// Arena of segments and basins keyed by id.
///
/// Adjacency is stored as id sets on each segment rather than pointers.
/// Every mutation keeps the referential-symmetry invariant:
/// `a.downstream_id == Some(b)` iff `b.upstream_ids` contains `a`.
///
/// Lookups are hashed; anything that iterates sorts by id first so exports
/// and worklists are deterministic.
#[derive(Debug, Clone, Default)]
pub struct NetworkGraph {
    /// Segments by ID.
    segments: HashMap<SegmentId, Segment>,
    /// Basins by ID.
    basins: HashMap<BasinId, Basin>,
}

impl NetworkGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from loose segments and basins.
    ///
    /// `upstream_ids` on the input segments are ignored and rebuilt from the
    /// downstream links, so the result is symmetric by construction. Basins
    /// are bound to segments afterwards.
    pub fn build(
        segments: impl IntoIterator<Item = Segment>,
        basins: impl IntoIterator<Item = Basin>,
    ) -> Result<Self, GraphError> {
        let mut graph = Self::new();

        for mut segment in segments {
            check_length(segment.id, segment.length)?;
            segment.upstream_ids.clear();
            segment.basin_id = None;
            if graph.segments.contains_key(&segment.id) {
                return Err(GraphError::DuplicateSegment(segment.id));
            }
            graph.segments.insert(segment.id, segment);
        }

        let links: Vec<(SegmentId, SegmentId)> = graph
            .segments
            .values()
            .filter_map(|s| s.downstream_id.map(|d| (s.id, d)))
            .collect();

        for (id, downstream) in links {
            if id == downstream {
                return Err(GraphError::InvalidDownstream { segment: id, downstream });
            }
            graph
                .segments
                .get_mut(&downstream)
                .ok_or(GraphError::InvalidDownstream { segment: id, downstream })?
                .upstream_ids
                .insert(id);
        }

        for basin in basins {
            graph.add_basin(basin)?;
        }

        Ok(graph)
    }

    /// Insert a segment, linking it to its (already present) downstream.
    ///
    /// Inserting outlets first and working upstream builds any tree.
    pub fn add_segment(&mut self, mut segment: Segment) -> Result<(), GraphError> {
        check_length(segment.id, segment.length)?;
        if self.segments.contains_key(&segment.id) {
            return Err(GraphError::DuplicateSegment(segment.id));
        }

        if let Some(downstream) = segment.downstream_id {
            if downstream == segment.id {
                return Err(GraphError::InvalidDownstream { segment: segment.id, downstream });
            }
            self.segments
                .get_mut(&downstream)
                .ok_or(GraphError::InvalidDownstream { segment: segment.id, downstream })?
                .upstream_ids
                .insert(segment.id);
        }

        segment.upstream_ids.clear();
        segment.basin_id = None;
        self.segments.insert(segment.id, segment);
        Ok(())
    }

    /// Bind a basin to its segment.
    pub fn add_basin(&mut self, basin: Basin) -> Result<(), GraphError> {
        let segment = self
            .segments
            .get_mut(&basin.segment_id)
            .ok_or(GraphError::SegmentNotFound(basin.segment_id))?;

        if segment.basin_id.is_some() || self.basins.contains_key(&basin.id) {
            return Err(GraphError::DuplicateBasin(basin.segment_id));
        }

        segment.basin_id = Some(basin.id);
        self.basins.insert(basin.id, basin);
        Ok(())
    }

    /// Fetch a basin by id.
    pub fn get_basin(&self, id: BasinId) -> Result<&Basin, GraphError> {
        self.basins.get(&id).ok_or(GraphError::BasinNotFound(id))
    }

    /// Number of segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Number of basins.
    pub fn basin_count(&self) -> usize {
        self.basins.len()
    }

    /// All segment ids, ascending.
    pub fn segment_ids(&self) -> Vec<SegmentId> {
        let mut ids: Vec<SegmentId> = self.segments.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// All segments, ascending by id.
    pub fn segments(&self) -> Vec<&Segment> {
        let mut segments: Vec<&Segment> = self.segments.values().collect();
        segments.sort_unstable_by_key(|s| s.id);
        segments
    }

    /// All basins, ascending by id.
    pub fn basins(&self) -> Vec<&Basin> {
        let mut basins: Vec<&Basin> = self.basins.values().collect();
        basins.sort_unstable_by_key(|b| b.id);
        basins
    }

    /// Remove a segment and its basin, detaching it from its neighbors.
    ///
    /// The id disappears from the downstream neighbor's `upstream_ids`, and
    /// every former upstream neighbor loses its `downstream_id` (becoming an
    /// outlet). Symmetry is checked before anything is mutated.
    pub fn delete_segment(&mut self, id: SegmentId) -> Result<DeletedSegment, GraphError> {
        self.check_symmetry_of(id)?;

        let segment = self
            .segments
            .remove(&id)
            .ok_or(GraphError::SegmentNotFound(id))?;

        if let Some(downstream) = segment.downstream_id {
            if let Some(ds) = self.segments.get_mut(&downstream) {
                ds.upstream_ids.remove(&id);
            }
        }

        for upstream in &segment.upstream_ids {
            if let Some(us) = self.segments.get_mut(upstream) {
                us.downstream_id = None;
            }
        }

        let basin = segment.basin_id.and_then(|b| self.basins.remove(&b));

        Ok(DeletedSegment {
            former_upstream: segment.upstream_ids.clone(),
            former_downstream: segment.downstream_id,
            basin,
            segment,
        })
    }

    /// Create a zero-area basin bound to `segment_id`.
    pub fn insert_synthetic_basin(&mut self, segment_id: SegmentId) -> Result<BasinId, GraphError> {
        let basin = Basin::synthetic(segment_id);
        let id = basin.id;
        self.add_basin(basin)?;
        Ok(id)
    }

    /// Override a segment's length, returning the previous value.
    pub fn set_length(&mut self, id: SegmentId, value: f64) -> Result<f64, GraphError> {
        check_length(id, value)?;
        let segment = self
            .segments
            .get_mut(&id)
            .ok_or(GraphError::SegmentNotFound(id))?;
        Ok(std::mem::replace(&mut segment.length, value))
    }

    /// Check referential symmetry and basin binding across the whole graph.
    pub fn validate(&self) -> Result<(), GraphError> {
        for id in self.segment_ids() {
            self.check_symmetry_of(id)?;
        }

        for basin in self.basins.values() {
            let segment = self.get_segment(basin.segment_id)?;
            if segment.basin_id != Some(basin.id) {
                return Err(GraphError::BasinNotFound(basin.id));
            }
        }

        Ok(())
    }

    fn check_symmetry_of(&self, id: SegmentId) -> Result<(), GraphError> {
        let segment = self.get_segment(id)?;

        if let Some(downstream) = segment.downstream_id {
            let linked = self
                .segments
                .get(&downstream)
                .is_some_and(|ds| ds.upstream_ids.contains(&id));
            if !linked {
                return Err(GraphError::AsymmetricLink { segment: id, neighbor: downstream });
            }
        }

        for &upstream in &segment.upstream_ids {
            let linked = self
                .segments
                .get(&upstream)
                .is_some_and(|us| us.downstream_id == Some(id));
            if !linked {
                return Err(GraphError::AsymmetricLink { segment: id, neighbor: upstream });
            }
        }

        Ok(())
    }
}

impl NetworkView for NetworkGraph {
    fn get_segment(&self, id: SegmentId) -> Result<&Segment, GraphError> {
        self.segments.get(&id).ok_or(GraphError::SegmentNotFound(id))
    }

    fn basin_of(&self, id: SegmentId) -> Option<&Basin> {
        self.segments
            .get(&id)
            .and_then(|s| s.basin_id)
            .and_then(|b| self.basins.get(&b))
    }

    fn zero_length_ids(&self) -> Vec<SegmentId> {
        let mut ids: Vec<SegmentId> = self
            .segments
            .values()
            .filter(|s| s.is_zero_length())
            .map(|s| s.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn contains_segment(&self, id: SegmentId) -> bool {
        self.segments.contains_key(&id)
    }
}

fn check_length(segment: SegmentId, value: f64) -> Result<(), GraphError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(GraphError::InvalidLength { segment, value })
    }
}
