//! Build a [`NetworkGraph`] from stream and basin GeoJSON.

use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::config::FieldNames;
use crate::store::{GraphError, NetworkGraph};
use crate::types::{Basin, Segment, SegmentId};
use super::{CollectionMeta, FeatureCollection};

/// Error type for loading a network.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// File could not be opened or read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// File is not valid GeoJSON.
    #[error("Failed to parse {path}: {source}")]
    Json {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
    /// Required attribute missing or null.
    #[error("Feature {feature} of {layer} has no {field:?} attribute")]
    MissingField {
        /// Dataset the feature belongs to.
        layer: &'static str,
        /// Feature index.
        feature: usize,
        /// Attribute name.
        field: String,
    },
    /// Attribute present but not usable.
    #[error("Feature {feature} of {layer} has invalid {field:?} value {value}")]
    InvalidField {
        /// Dataset the feature belongs to.
        layer: &'static str,
        /// Feature index.
        feature: usize,
        /// Attribute name.
        field: String,
        /// Offending value.
        value: Value,
    },
    /// Inputs do not form a consistent network.
    #[error("Inconsistent network: {0}")]
    Graph(#[from] GraphError),
}

/// A loaded network plus the collection metadata the writer restores.
#[derive(Debug, Clone)]
pub struct LoadedNetwork {
    /// The network graph.
    pub graph: NetworkGraph,
    /// Stream collection name and CRS.
    pub streams_meta: CollectionMeta,
    /// Basin collection name and CRS.
    pub basins_meta: CollectionMeta,
    /// Basins whose key names no stream segment, in input order.
    pub unmatched_basins: Vec<Basin>,
}

/// Loads stream and basin datasets into a graph.
#[derive(Debug, Clone, Default)]
pub struct NetworkLoader {
    fields: FieldNames,
}

impl NetworkLoader {
    /// Create a loader using the given attribute names.
    pub fn new(fields: FieldNames) -> Self {
        Self { fields }
    }

    /// Read both files and build the graph.
    pub fn load(&self, streams: &Path, basins: &Path) -> Result<LoadedNetwork, LoadError> {
        let streams = read_collection(streams)?;
        let basins = read_collection(basins)?;
        self.load_collections(streams, basins)
    }

    /// Build the graph from already-parsed collections.
    ///
    /// Upstream sets are derived from the next-downstream attribute, so the
    /// graph is symmetric by construction; a downstream id with no matching
    /// segment is a fatal error. A basin with no matching segment is kept
    /// aside in [`LoadedNetwork::unmatched_basins`].
    pub fn load_collections(
        &self,
        streams: FeatureCollection,
        basins: FeatureCollection,
    ) -> Result<LoadedNetwork, LoadError> {
        let streams_meta = streams.meta();
        let basins_meta = basins.meta();

        let mut segments = Vec::with_capacity(streams.features.len());
        for (index, feature) in streams.features.into_iter().enumerate() {
            let props = feature.properties.unwrap_or_default();
            let id = required_id(&props, &self.fields.id, "streams", index)?;
            let length = required_number(&props, &self.fields.length, "streams", index)?;
            let downstream = optional_link(&props, &self.fields.downstream, "streams", index)?;

            let mut segment = Segment::new(SegmentId::new(id), length)
                .with_properties(props)
                .with_geometry(feature.geometry);
            segment.downstream_id = downstream.map(SegmentId::new);
            segments.push(segment);
        }

        let segment_ids: HashSet<SegmentId> = segments.iter().map(|s| s.id).collect();
        let mut basin_list = Vec::with_capacity(basins.features.len());
        let mut unmatched_basins = Vec::new();
        for (index, feature) in basins.features.into_iter().enumerate() {
            let props = feature.properties.unwrap_or_default();
            let key = required_id(&props, &self.fields.basin_id, "basins", index)?;
            let area = match &self.fields.basin_area {
                Some(field) => Some(required_number(&props, field, "basins", index)?),
                None => None,
            };

            let basin = Basin::new(SegmentId::new(key), area)
                .with_properties(props)
                .with_geometry(feature.geometry);
            if segment_ids.contains(&basin.segment_id) {
                basin_list.push(basin);
            } else {
                tracing::warn!(feature = index, basin_key = key, "basin has no matching stream segment");
                unmatched_basins.push(basin);
            }
        }

        let graph = NetworkGraph::build(segments, basin_list)?;
        tracing::info!(
            segments = graph.segment_count(),
            basins = graph.basin_count(),
            unmatched_basins = unmatched_basins.len(),
            "loaded network"
        );

        Ok(LoadedNetwork { graph, streams_meta, basins_meta, unmatched_basins })
    }
}

/// Read a GeoJSON feature collection from disk.
pub fn read_collection(path: &Path) -> Result<FeatureCollection, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io { path: path.to_path_buf(), source })?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|source| LoadError::Json { path: path.to_path_buf(), source })
}

fn required<'a>(
    props: &'a Map<String, Value>,
    field: &str,
    layer: &'static str,
    feature: usize,
) -> Result<&'a Value, LoadError> {
    match props.get(field) {
        Some(Value::Null) | None => Err(LoadError::MissingField { layer, feature, field: field.to_string() }),
        Some(value) => Ok(value),
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

fn required_id(
    props: &Map<String, Value>,
    field: &str,
    layer: &'static str,
    feature: usize,
) -> Result<i64, LoadError> {
    let value = required(props, field, layer, feature)?;
    as_integer(value).ok_or_else(|| LoadError::InvalidField {
        layer,
        feature,
        field: field.to_string(),
        value: value.clone(),
    })
}

fn required_number(
    props: &Map<String, Value>,
    field: &str,
    layer: &'static str,
    feature: usize,
) -> Result<f64, LoadError> {
    let value = required(props, field, layer, feature)?;
    value.as_f64().ok_or_else(|| LoadError::InvalidField {
        layer,
        feature,
        field: field.to_string(),
        value: value.clone(),
    })
}

/// Downstream link; null, missing or negative (`-1`) means outlet.
fn optional_link(
    props: &Map<String, Value>,
    field: &str,
    layer: &'static str,
    feature: usize,
) -> Result<Option<i64>, LoadError> {
    match props.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let id = as_integer(value).ok_or_else(|| LoadError::InvalidField {
                layer,
                feature,
                field: field.to_string(),
                value: value.clone(),
            })?;
            Ok((id >= 0).then_some(id))
        }
    }
}
