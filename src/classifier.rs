//! Zero-length segment classification.
//!
//! A zero-length segment is classified purely from its local connectivity.
//! Cases are tested in priority order and are mutually exclusive:
//!
//! | Case | Upstream | Downstream | Repair |
//! |------|----------|------------|--------|
//! | Isolated | none | none | delete segment and basin |
//! | Confluence | some | some | synthetic basin + unit length |
//! | Outlet | some | none | unit length |
//! | Unclassified | none | some | none, reported for review |

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::store::{GraphError, NetworkView};
use crate::types::SegmentId;

/// Repair pattern for a zero-length segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairCase {
    /// Coastal fragment disconnected in both directions.
    Isolated,
    /// Bridges a multi-way confluence with zero extent.
    Confluence,
    /// Coastal or basin outlet with real inflow.
    Outlet,
    /// Any other topology, notably a zero-length headwater feeding downstream.
    Unclassified,
}

impl RepairCase {
    /// Whether the engine knows how to repair this case.
    pub fn is_repairable(&self) -> bool {
        !matches!(self, Self::Unclassified)
    }
}

impl fmt::Display for RepairCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Isolated => write!(f, "isolated"),
            Self::Confluence => write!(f, "confluence"),
            Self::Outlet => write!(f, "outlet"),
            Self::Unclassified => write!(f, "unclassified"),
        }
    }
}

/// Classify a segment by its upstream/downstream connectivity.
///
/// Intended for zero-length segments; length itself is not inspected.
pub fn classify<V: NetworkView + ?Sized>(view: &V, id: SegmentId) -> Result<RepairCase, GraphError> {
    let segment = view.get_segment(id)?;
    let has_upstream = !segment.upstream_ids.is_empty();
    let has_downstream = segment.downstream_id.is_some();

    Ok(match (has_upstream, has_downstream) {
        (false, false) => RepairCase::Isolated,
        (true, true) => RepairCase::Confluence,
        (true, false) => RepairCase::Outlet,
        (false, true) => RepairCase::Unclassified,
    })
}

/// Ids of every zero-length segment grouped by repair case.
///
/// Each list is ascending. This is the pre-repair audit table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseTable {
    /// Isolated segments.
    pub isolated: Vec<SegmentId>,
    /// Confluence segments.
    pub confluence: Vec<SegmentId>,
    /// Outlet segments.
    pub outlet: Vec<SegmentId>,
    /// Unclassified segments.
    pub unclassified: Vec<SegmentId>,
}

impl CaseTable {
    /// Total number of zero-length segments classified.
    pub fn len(&self) -> usize {
        self.isolated.len() + self.confluence.len() + self.outlet.len() + self.unclassified.len()
    }

    /// Whether the network had no zero-length segments.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids recorded under a case.
    pub fn ids(&self, case: RepairCase) -> &[SegmentId] {
        match case {
            RepairCase::Isolated => &self.isolated,
            RepairCase::Confluence => &self.confluence,
            RepairCase::Outlet => &self.outlet,
            RepairCase::Unclassified => &self.unclassified,
        }
    }

    fn push(&mut self, case: RepairCase, id: SegmentId) {
        match case {
            RepairCase::Isolated => self.isolated.push(id),
            RepairCase::Confluence => self.confluence.push(id),
            RepairCase::Outlet => self.outlet.push(id),
            RepairCase::Unclassified => self.unclassified.push(id),
        }
    }
}

/// Classify every zero-length segment of the network without mutating it.
pub fn classify_zero_length<V: NetworkView + ?Sized>(view: &V) -> Result<CaseTable, GraphError> {
    let mut table = CaseTable::default();

    for id in view.zero_length_ids() {
        let case = classify(view, id)?;
        if case == RepairCase::Unclassified {
            let downstream = view.downstream_of(id)?;
            tracing::warn!(
                segment_id = %id,
                downstream_id = ?downstream,
                "zero-length segment has a topology with no known repair"
            );
        }
        table.push(case, id);
    }

    tracing::debug!(
        isolated = table.isolated.len(),
        confluence = table.confluence.len(),
        outlet = table.outlet.len(),
        unclassified = table.unclassified.len(),
        "classified zero-length segments"
    );

    Ok(table)
}
