//! Canonical serialization for deterministic network fingerprints.
//!
//! ## Determinism Guarantees
//!
//! - Segments and basins are hashed in ascending id order
//! - Upstream sets are `BTreeSet`s and serialize sorted
//! - Lengths and areas are quantized to micrometers before hashing
//! - Source attributes and geometry are excluded: the fingerprint identifies
//!   topology and repair state, not payload

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

use crate::store::NetworkGraph;
use crate::types::{BasinId, SegmentId};

/// Quantization factor for float normalization.
const FLOAT_QUANTIZATION_FACTOR: f64 = 1_000_000.0;

/// Serialize a value to canonical JSON bytes for hashing.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}

/// Compute canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> Result<u64, serde_json::Error> {
    let bytes = to_canonical_bytes(value)?;
    Ok(xxh64(&bytes, 0))
}

/// Compute canonical hash and return as hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(format!("{:016x}", canonical_hash(value)?))
}

#[derive(Serialize)]
struct SegmentKey<'a> {
    id: SegmentId,
    length: i64,
    upstream: &'a std::collections::BTreeSet<SegmentId>,
    downstream: Option<SegmentId>,
    basin: Option<BasinId>,
}

#[derive(Serialize)]
struct BasinKey {
    id: BasinId,
    segment: SegmentId,
    area: Option<i64>,
    synthetic: bool,
}

/// Fingerprint of a network's topology, lengths and basins.
///
/// Two graphs with the same fingerprint would be written identically apart
/// from passthrough attributes.
pub fn network_fingerprint(graph: &NetworkGraph) -> String {
    let segments: Vec<SegmentKey<'_>> = graph
        .segments()
        .into_iter()
        .map(|s| SegmentKey {
            id: s.id,
            length: quantize(s.length),
            upstream: &s.upstream_ids,
            downstream: s.downstream_id,
            basin: s.basin_id,
        })
        .collect();

    let basins: Vec<BasinKey> = graph
        .basins()
        .into_iter()
        .map(|b| BasinKey {
            id: b.id,
            segment: b.segment_id,
            area: b.area.map(quantize),
            synthetic: b.synthetic,
        })
        .collect();

    // Keys hold only integers, ids and bools; serialization cannot fail.
    canonical_hash_hex(&(segments, basins)).unwrap_or_default()
}

fn quantize(value: f64) -> i64 {
    (value * FLOAT_QUANTIZATION_FACTOR).round() as i64
}
