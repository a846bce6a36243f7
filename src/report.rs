//! Per-segment outcomes of a repair run.
//!
//! The report is the audit trail the caller inspects before persisting the
//! repaired network: every zero-length segment the engine touched (or
//! refused to touch) has exactly one entry, keyed by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::classifier::RepairCase;
use crate::engine::{RepairError, RepairPolicy};
use crate::types::{BasinId, ConnectivitySnapshot, SegmentId};
use crate::REPORT_SCHEMA_VERSION;

/// Outcome tag used for summary counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeTag {
    /// Segment and basin removed.
    Deleted,
    /// Length overridden, possibly with a synthetic basin.
    Fixed,
    /// Left untouched for manual review.
    Error,
}

impl fmt::Display for OutcomeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deleted => write!(f, "deleted"),
            Self::Fixed => write!(f, "fixed"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// What the engine did with one zero-length segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SegmentOutcome {
    /// Segment deleted together with its basin.
    Deleted {
        /// Case that triggered the deletion.
        case: RepairCase,
        /// Basin removed alongside the segment.
        basin_id: Option<BasinId>,
    },
    /// Segment length overridden.
    Fixed {
        /// Case that triggered the fix.
        case: RepairCase,
        /// Length assigned.
        length: f64,
        /// Synthetic basin created by the fix.
        synthetic_basin: Option<BasinId>,
    },
    /// Topology matched no known repair.
    Error {
        /// Connectivity at classification time.
        snapshot: ConnectivitySnapshot,
    },
}

impl SegmentOutcome {
    /// Get the summary tag.
    pub fn tag(&self) -> OutcomeTag {
        match self {
            Self::Deleted { .. } => OutcomeTag::Deleted,
            Self::Fixed { .. } => OutcomeTag::Fixed,
            Self::Error { .. } => OutcomeTag::Error,
        }
    }
}

/// Count of outcomes per tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Segments deleted.
    pub deleted: usize,
    /// Segments fixed.
    pub fixed: usize,
    /// Segments left in error.
    pub errors: usize,
}

impl ReportSummary {
    /// Total number of recorded outcomes.
    pub fn total(&self) -> usize {
        self.deleted + self.fixed + self.errors
    }

    /// Count for a single tag.
    pub fn count(&self, tag: OutcomeTag) -> usize {
        match tag {
            OutcomeTag::Deleted => self.deleted,
            OutcomeTag::Fixed => self.fixed,
            OutcomeTag::Error => self.errors,
        }
    }
}

/// Accumulated outcomes of one repair run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Unique identifier for this run.
    pub run_id: Uuid,
    /// Schema version of the report.
    pub schema_version: String,
    /// Policy the engine ran with.
    pub policy: RepairPolicy,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished; `None` while in progress.
    pub finished_at: Option<DateTime<Utc>>,
    /// Network fingerprint before any mutation.
    pub fingerprint_before: String,
    /// Network fingerprint after the run.
    pub fingerprint_after: String,
    /// Latest outcome per segment.
    outcomes: BTreeMap<SegmentId, SegmentOutcome>,
}

impl ValidationReport {
    /// Start a report for a run over a network with the given fingerprint.
    pub fn new(policy: RepairPolicy, fingerprint_before: String) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            policy,
            started_at: Utc::now(),
            finished_at: None,
            fingerprint_after: fingerprint_before.clone(),
            fingerprint_before,
            outcomes: BTreeMap::new(),
        }
    }

    /// Record an outcome, replacing any earlier one for the same segment.
    pub fn record(&mut self, id: SegmentId, outcome: SegmentOutcome) -> Option<SegmentOutcome> {
        self.outcomes.insert(id, outcome)
    }

    /// Close the report.
    pub fn finish(&mut self, fingerprint_after: String) {
        self.fingerprint_after = fingerprint_after;
        self.finished_at = Some(Utc::now());
    }

    /// Outcome recorded for a segment.
    pub fn get(&self, id: SegmentId) -> Option<&SegmentOutcome> {
        self.outcomes.get(&id)
    }

    /// All outcomes, ascending by segment id.
    pub fn outcomes(&self) -> impl Iterator<Item = (SegmentId, &SegmentOutcome)> {
        self.outcomes.iter().map(|(id, o)| (*id, o))
    }

    /// Ids recorded under a tag, ascending.
    pub fn ids_with(&self, tag: OutcomeTag) -> Vec<SegmentId> {
        self.outcomes()
            .filter(|(_, o)| o.tag() == tag)
            .map(|(id, _)| id)
            .collect()
    }

    /// Error entries with their connectivity snapshots.
    pub fn errors(&self) -> Vec<(SegmentId, &ConnectivitySnapshot)> {
        self.outcomes()
            .filter_map(|(id, o)| match o {
                SegmentOutcome::Error { snapshot } => Some((id, snapshot)),
                _ => None,
            })
            .collect()
    }

    /// Count of outcomes per tag.
    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();
        for outcome in self.outcomes.values() {
            match outcome.tag() {
                OutcomeTag::Deleted => summary.deleted += 1,
                OutcomeTag::Fixed => summary.fixed += 1,
                OutcomeTag::Error => summary.errors += 1,
            }
        }
        summary
    }

    /// Whether any segment was left unrepaired.
    pub fn has_errors(&self) -> bool {
        self.outcomes.values().any(|o| o.tag() == OutcomeTag::Error)
    }

    /// Whether the run changed nothing.
    pub fn is_noop(&self) -> bool {
        self.outcomes.values().all(|o| o.tag() == OutcomeTag::Error)
            && self.fingerprint_before == self.fingerprint_after
    }

    /// Fail with the unrepaired ids if the run has errors.
    pub fn ensure_clean(&self) -> Result<(), RepairError> {
        if self.has_errors() {
            return Err(RepairError::UnclassifiedTopology {
                segment_ids: self.ids_with(OutcomeTag::Error),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn sid(raw: i64) -> SegmentId {
        SegmentId::new(raw)
    }

    fn error_outcome(downstream: i64) -> SegmentOutcome {
        SegmentOutcome::Error {
            snapshot: ConnectivitySnapshot {
                length: 0.0,
                upstream_ids: BTreeSet::new(),
                downstream_id: Some(sid(downstream)),
                basin_id: None,
            },
        }
    }

    #[test]
    fn test_summary_counts() {
        let mut report = ValidationReport::new(RepairPolicy::default(), "abc".to_string());
        report.record(sid(1), SegmentOutcome::Deleted { case: RepairCase::Isolated, basin_id: None });
        report.record(
            sid(2),
            SegmentOutcome::Fixed { case: RepairCase::Outlet, length: 1.0, synthetic_basin: None },
        );
        report.record(sid(3), error_outcome(9));

        let summary = report.summary();
        assert_eq!(summary, ReportSummary { deleted: 1, fixed: 1, errors: 1 });
        assert_eq!(summary.total(), 3);
        assert!(report.has_errors());
        assert_eq!(report.ids_with(OutcomeTag::Error), vec![sid(3)]);
        assert_eq!(report.errors()[0].1.downstream_id, Some(sid(9)));
    }

    #[test]
    fn test_record_replaces_earlier_outcome() {
        let mut report = ValidationReport::new(RepairPolicy::default(), "abc".to_string());
        report.record(sid(4), error_outcome(5));
        let previous =
            report.record(sid(4), SegmentOutcome::Deleted { case: RepairCase::Isolated, basin_id: None });

        assert!(matches!(previous, Some(SegmentOutcome::Error { .. })));
        assert!(!report.has_errors());
        assert_eq!(report.summary().total(), 1);
    }

    #[test]
    fn test_ensure_clean() {
        let mut report = ValidationReport::new(RepairPolicy::default(), "abc".to_string());
        assert!(report.ensure_clean().is_ok());
        assert!(report.is_noop());

        report.record(sid(7), error_outcome(8));
        match report.ensure_clean() {
            Err(RepairError::UnclassifiedTopology { segment_ids }) => assert_eq!(segment_ids, vec![sid(7)]),
            other => panic!("expected unclassified topology, got {:?}", other),
        }
    }

    #[test]
    fn test_report_serializes_tagged_outcomes() {
        let mut report = ValidationReport::new(RepairPolicy::default(), "abc".to_string());
        report.record(
            sid(2),
            SegmentOutcome::Fixed {
                case: RepairCase::Confluence,
                length: 1.0,
                synthetic_basin: Some(BasinId::new(2)),
            },
        );
        report.finish("def".to_string());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcomes"]["2"]["outcome"], "fixed");
        assert_eq!(json["outcomes"]["2"]["case"], "confluence");
        assert_eq!(json["fingerprint_after"], "def");

        let back: ValidationReport = serde_json::from_value(json).unwrap();
        assert_eq!(back.summary().fixed, 1);
        assert!(back.finished_at.is_some());
    }
}
