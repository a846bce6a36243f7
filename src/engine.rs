//! Worklist-driven repair of zero-length segments.
//!
//! ## Algorithm
//!
//! 1. Seed the worklist with every zero-length segment, ascending by id
//! 2. Pop the smallest id; skip it if a previous repair removed it or
//!    already gave it a non-zero length
//! 3. Classify and apply the repair:
//!    - Isolated: delete segment and basin
//!    - Confluence: synthetic zero-area basin, then unit length
//!    - Outlet: unit length
//!    - Unclassified: record the connectivity snapshot, leave the graph alone
//! 4. After a deletion, push every zero-length former neighbor back onto the
//!    worklist, since its classification may have changed
//!
//! Length overrides never change topology, so only deletions re-enqueue.
//! Each deletion shrinks the graph and each fix removes a segment from the
//! zero-length set, so the loop terminates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::canonical::network_fingerprint;
use crate::classifier::{classify, RepairCase};
use crate::report::{SegmentOutcome, ValidationReport};
use crate::store::{DeletedSegment, GraphError, NetworkGraph, NetworkView};
use crate::types::SegmentId;

/// Length assigned to repaired segments: one meter under the TDX-Hydro unit convention.
pub const DEFAULT_REPAIR_LENGTH: f64 = 1.0;

/// Error type for repair runs.
#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    /// Structural invariant violated; the input graph was inconsistent.
    #[error("Graph invariant violated: {0}")]
    Graph(#[from] GraphError),
    /// Policy parameters out of range.
    #[error("Invalid repair policy: {0}")]
    InvalidPolicy(String),
    /// Zero-length segments whose topology matched no known repair.
    #[error("{} zero-length segment(s) with unclassified topology: {:?}", .segment_ids.len(), .segment_ids)]
    UnclassifiedTopology {
        /// Offending segment ids, ascending.
        segment_ids: Vec<SegmentId>,
    },
}

/// Parameters for a repair run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairPolicy {
    /// Length assigned to confluence and outlet segments.
    pub repair_length: f64,
    /// Check referential symmetry over the whole graph before and after the run.
    pub validate_graph: bool,
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self {
            repair_length: DEFAULT_REPAIR_LENGTH,
            validate_graph: true,
        }
    }
}

/// Drives classification and repair over a network graph.
#[derive(Debug, Clone, Default)]
pub struct RepairEngine {
    policy: RepairPolicy,
}

impl RepairEngine {
    /// Create an engine with the given policy.
    pub fn new(policy: RepairPolicy) -> Self {
        Self { policy }
    }

    /// The policy in use.
    pub fn policy(&self) -> &RepairPolicy {
        &self.policy
    }

    /// Repair every zero-length segment of `graph` in place.
    ///
    /// Unclassified segments are collected in the report, not raised; a
    /// `GraphError` aborts the run and leaves the graph unfit for writing.
    pub fn repair(&self, graph: &mut NetworkGraph) -> Result<ValidationReport, RepairError> {
        if self.policy.repair_length <= 0.0 || !self.policy.repair_length.is_finite() {
            return Err(RepairError::InvalidPolicy(format!(
                "repair_length must be positive and finite, got {}",
                self.policy.repair_length
            )));
        }
        if self.policy.validate_graph {
            graph.validate()?;
        }

        let mut report = ValidationReport::new(self.policy.clone(), network_fingerprint(graph));
        let mut worklist: BTreeSet<SegmentId> = graph.zero_length_ids().into_iter().collect();

        tracing::info!(
            run_id = %report.run_id,
            segments = graph.segment_count(),
            zero_length = worklist.len(),
            "starting repair run"
        );

        while let Some(id) = worklist.pop_first() {
            let Ok(segment) = graph.get_segment(id) else {
                tracing::trace!(segment_id = %id, "skipping segment removed by an earlier repair");
                continue;
            };
            if !segment.is_zero_length() {
                continue;
            }

            let case = classify(&*graph, id)?;
            match case {
                RepairCase::Isolated => {
                    let deleted = graph.delete_segment(id)?;
                    tracing::debug!(segment_id = %id, case = %case, "deleted segment");
                    report.record(
                        id,
                        SegmentOutcome::Deleted { case, basin_id: deleted.basin.as_ref().map(|b| b.id) },
                    );
                    requeue_neighbors(graph, &deleted, &mut worklist);
                }
                RepairCase::Confluence => {
                    let basin_id = graph.insert_synthetic_basin(id)?;
                    graph.set_length(id, self.policy.repair_length)?;
                    tracing::debug!(segment_id = %id, case = %case, basin_id = %basin_id, "fixed segment");
                    report.record(
                        id,
                        SegmentOutcome::Fixed {
                            case,
                            length: self.policy.repair_length,
                            synthetic_basin: Some(basin_id),
                        },
                    );
                }
                RepairCase::Outlet => {
                    graph.set_length(id, self.policy.repair_length)?;
                    tracing::debug!(segment_id = %id, case = %case, "fixed segment");
                    report.record(
                        id,
                        SegmentOutcome::Fixed { case, length: self.policy.repair_length, synthetic_basin: None },
                    );
                }
                RepairCase::Unclassified => {
                    let snapshot = segment.snapshot();
                    tracing::warn!(
                        segment_id = %id,
                        downstream_id = ?snapshot.downstream_id,
                        "zero-length segment left for manual review"
                    );
                    report.record(id, SegmentOutcome::Error { snapshot });
                }
            }
        }

        if self.policy.validate_graph {
            graph.validate()?;
        }
        report.finish(network_fingerprint(graph));

        let summary = report.summary();
        tracing::info!(
            run_id = %report.run_id,
            deleted = summary.deleted,
            fixed = summary.fixed,
            errors = summary.errors,
            "repair run complete"
        );

        Ok(report)
    }
}

/// Push zero-length survivors adjacent to a deleted segment back onto the worklist.
fn requeue_neighbors(graph: &NetworkGraph, deleted: &DeletedSegment, worklist: &mut BTreeSet<SegmentId>) {
    let neighbors = deleted.former_upstream.iter().chain(deleted.former_downstream.iter());
    for &neighbor in neighbors {
        if graph.get_segment(neighbor).is_ok_and(|s| s.is_zero_length()) && worklist.insert(neighbor) {
            tracing::debug!(
                segment_id = %neighbor,
                deleted_id = %deleted.segment.id,
                "re-enqueued neighbor of deleted segment"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::OutcomeTag;
    use crate::types::{Basin, Segment};

    fn sid(raw: i64) -> SegmentId {
        SegmentId::new(raw)
    }

    #[test]
    fn test_repair_all_cases() {
        //  1   2
        //   \ /
        //    3 (0)     5 (0)   7 (0)
        //    |         |
        //    4 (0)     6
        let mut graph = NetworkGraph::build(
            vec![
                Segment::new(sid(1), 10.0).with_downstream(sid(3)),
                Segment::new(sid(2), 10.0).with_downstream(sid(3)),
                Segment::new(sid(3), 0.0).with_downstream(sid(4)),
                Segment::new(sid(4), 0.0),
                Segment::new(sid(5), 0.0).with_downstream(sid(6)),
                Segment::new(sid(6), 50.0),
                Segment::new(sid(7), 0.0),
            ],
            vec![Basin::new(sid(4), Some(3.0)), Basin::new(sid(7), Some(1.0))],
        )
        .unwrap();

        let report = RepairEngine::default().repair(&mut graph).unwrap();

        assert_eq!(report.ids_with(OutcomeTag::Deleted), vec![sid(7)]);
        assert_eq!(report.ids_with(OutcomeTag::Fixed), vec![sid(3), sid(4)]);
        assert_eq!(report.ids_with(OutcomeTag::Error), vec![sid(5)]);
        assert!(report.has_errors());

        assert!(!graph.contains_segment(sid(7)));
        assert_eq!(graph.get_segment(sid(3)).unwrap().length, 1.0);
        assert_eq!(graph.get_segment(sid(4)).unwrap().length, 1.0);
        assert_eq!(graph.get_segment(sid(5)).unwrap().length, 0.0);
        assert!(graph.basin_of(sid(3)).unwrap().synthetic);
        assert!(!graph.basin_of(sid(4)).unwrap().synthetic);
    }

    #[test]
    fn test_custom_repair_length() {
        let mut graph = NetworkGraph::build(
            vec![Segment::new(sid(1), 4.0).with_downstream(sid(2)), Segment::new(sid(2), 0.0)],
            vec![],
        )
        .unwrap();

        let engine = RepairEngine::new(RepairPolicy { repair_length: 0.5, ..RepairPolicy::default() });
        engine.repair(&mut graph).unwrap();
        assert_eq!(graph.get_segment(sid(2)).unwrap().length, 0.5);
    }

    #[test]
    fn test_rejects_non_positive_repair_length() {
        let mut graph = NetworkGraph::new();
        let engine = RepairEngine::new(RepairPolicy { repair_length: 0.0, ..RepairPolicy::default() });
        assert!(matches!(engine.repair(&mut graph), Err(RepairError::InvalidPolicy(_))));
    }

    #[test]
    fn test_duplicate_basin_aborts() {
        // Confluence segment 3 already carries a basin.
        let mut graph = NetworkGraph::build(
            vec![
                Segment::new(sid(1), 10.0).with_downstream(sid(3)),
                Segment::new(sid(3), 0.0).with_downstream(sid(4)),
                Segment::new(sid(4), 10.0),
            ],
            vec![Basin::new(sid(3), Some(2.0))],
        )
        .unwrap();

        let err = RepairEngine::default().repair(&mut graph).unwrap_err();
        assert!(matches!(err, RepairError::Graph(GraphError::DuplicateBasin(id)) if id == sid(3)));
    }

    #[test]
    fn test_requeue_after_deletion() {
        // Neighbors come back only while they are still zero-length.
        let mut graph = NetworkGraph::build(
            vec![Segment::new(sid(10), 0.0), Segment::new(sid(20), 0.0).with_downstream(sid(10))],
            vec![],
        )
        .unwrap();
        let deleted = DeletedSegment {
            segment: Segment::new(sid(99), 0.0).with_downstream(sid(10)),
            basin: None,
            former_upstream: [sid(20)].into_iter().collect(),
            former_downstream: Some(sid(10)),
        };

        let mut worklist = BTreeSet::new();
        requeue_neighbors(&graph, &deleted, &mut worklist);
        assert_eq!(worklist.into_iter().collect::<Vec<_>>(), vec![sid(10), sid(20)]);

        graph.set_length(sid(20), 3.0).unwrap();
        let mut worklist = BTreeSet::new();
        requeue_neighbors(&graph, &deleted, &mut worklist);
        assert_eq!(worklist.into_iter().collect::<Vec<_>>(), vec![sid(10)]);
    }
}
