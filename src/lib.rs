//! # streamnet-repair
//!
//! Deterministic repair of zero-length segments in hydrographic stream networks.
//!
//! Zero-length segments are artifacts of network extraction. Each one is
//! classified by its connectivity and then deleted, lengthened, or reported.
//!
//! ## Core Contract
//!
//! 1. Load a stream network and its catchment basins into a [`NetworkGraph`]
//! 2. Classify every zero-length segment into a [`RepairCase`]
//! 3. Apply the case's repair, re-checking neighbors exposed by deletions
//! 4. Emit a [`ValidationReport`] with exactly one outcome per touched segment
//!
//! ## Architecture
//!
//! ```text
//! GeoJSON → NetworkLoader → NetworkGraph ← NetworkView
//!                                ↓
//!                     classify → RepairEngine → ValidationReport
//!                                ↓
//!                          NetworkWriter → GeoJSON
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same graph + same policy → identical graph and outcomes
//! - Zero-length segments are processed in ascending id order
//! - Network fingerprints ignore geometry and pass-through attributes

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod store;
pub mod classifier;
pub mod engine;
pub mod report;
pub mod canonical;
pub mod config;
pub mod io;
pub mod batch;

// Re-exports
pub use types::{Basin, BasinId, ConnectivitySnapshot, Segment, SegmentId};
pub use store::{DeletedSegment, GraphError, NetworkGraph, NetworkView};
pub use classifier::{classify, classify_zero_length, CaseTable, RepairCase};
pub use engine::{RepairEngine, RepairError, RepairPolicy, DEFAULT_REPAIR_LENGTH};
pub use report::{OutcomeTag, ReportSummary, SegmentOutcome, ValidationReport};
pub use canonical::{canonical_hash, canonical_hash_hex, network_fingerprint, to_canonical_bytes};
pub use config::{ConfigError, FieldNames, RunConfig};
pub use io::{
    CollectionMeta, Feature, FeatureCollection, LoadError, LoadedNetwork, NetworkLoader,
    NetworkWriter, WriteError, WriteSummary,
};
pub use batch::{run_batch, BatchError, BatchSummary, RegionFiles, RegionOutcome};

/// Schema version of serialized reports.
/// Increment on breaking changes to [`ValidationReport`].
pub const REPORT_SCHEMA_VERSION: &str = "1.0.0";
