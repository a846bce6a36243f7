//! Persist a repaired network as GeoJSON.

use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

use crate::config::FieldNames;
use crate::report::ValidationReport;
use crate::store::NetworkGraph;
use crate::types::{Basin, Segment};
use super::{write_json_atomic, CollectionMeta, Feature, FeatureCollection};

/// Attribute flagging synthetic basins on output.
pub const SYNTHETIC_FLAG_FIELD: &str = "synthetic";

/// Area attribute used for synthetic basins when the dataset has none.
pub const DEFAULT_AREA_FIELD: &str = "area";

/// Error type for writing a network.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// Refused: the run left unrepaired segments and partial output was not allowed.
    #[error("Refusing to write network with {error_count} unrepaired segment(s)")]
    Unrepaired {
        /// Number of error entries in the report.
        error_count: usize,
    },
    /// File could not be written.
    #[error("Failed to write {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Counts of what was written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Stream features written.
    pub segments: usize,
    /// Basin features written, synthetic included.
    pub basins: usize,
    /// Synthetic basin features written.
    pub synthetic_basins: usize,
}

/// Writes surviving segments and basins back to GeoJSON.
#[derive(Debug, Clone, Default)]
pub struct NetworkWriter {
    fields: FieldNames,
    allow_partial: bool,
    unmatched_basins: Vec<Basin>,
}

impl NetworkWriter {
    /// Create a writer using the given attribute names.
    pub fn new(fields: FieldNames) -> Self {
        Self { fields, allow_partial: false, unmatched_basins: Vec::new() }
    }

    /// Persist even when the report has errors.
    pub fn allow_partial(mut self, allow: bool) -> Self {
        self.allow_partial = allow;
        self
    }

    /// Emit basins that never entered the graph alongside the graph's own.
    pub fn with_unmatched_basins(mut self, basins: Vec<Basin>) -> Self {
        self.unmatched_basins = basins;
        self
    }

    /// Write both datasets, unless the report forbids it.
    pub fn write(
        &self,
        graph: &NetworkGraph,
        report: &ValidationReport,
        streams: (&Path, &CollectionMeta),
        basins: (&Path, &CollectionMeta),
    ) -> Result<WriteSummary, WriteError> {
        let summary = report.summary();
        if summary.errors > 0 {
            if !self.allow_partial {
                return Err(WriteError::Unrepaired { error_count: summary.errors });
            }
            tracing::warn!(errors = summary.errors, "writing partial output with unrepaired segments");
        }

        let (streams_fc, basins_fc) = self.to_collections(graph, streams.1, basins.1);
        let written = WriteSummary {
            segments: streams_fc.features.len(),
            basins: basins_fc.features.len(),
            synthetic_basins: graph.basins().iter().filter(|b| b.synthetic).count(),
        };

        write_json_atomic(streams.0, &streams_fc)
            .map_err(|source| WriteError::Io { path: streams.0.to_path_buf(), source })?;
        write_json_atomic(basins.0, &basins_fc)
            .map_err(|source| WriteError::Io { path: basins.0.to_path_buf(), source })?;

        tracing::info!(
            segments = written.segments,
            basins = written.basins,
            synthetic_basins = written.synthetic_basins,
            "wrote network"
        );
        Ok(written)
    }

    /// Render the graph as stream and basin collections, ascending by id.
    ///
    /// Unmatched basins are merged into the basin collection by id.
    pub fn to_collections(
        &self,
        graph: &NetworkGraph,
        streams_meta: &CollectionMeta,
        basins_meta: &CollectionMeta,
    ) -> (FeatureCollection, FeatureCollection) {
        let streams = graph.segments().into_iter().map(|s| self.segment_feature(s)).collect();
        let mut all_basins = graph.basins();
        all_basins.extend(self.unmatched_basins.iter());
        all_basins.sort_by_key(|b| b.id);
        let basins = all_basins.into_iter().map(|b| self.basin_feature(b)).collect();
        (
            FeatureCollection::with_meta(streams_meta, streams),
            FeatureCollection::with_meta(basins_meta, basins),
        )
    }

    fn segment_feature(&self, segment: &Segment) -> Feature {
        let mut props = segment.properties.clone();
        props.insert(self.fields.id.clone(), json!(segment.id.get()));
        props.insert(self.fields.length.clone(), json!(segment.length));
        props.insert(
            self.fields.downstream.clone(),
            json!(segment.downstream_id.map_or(-1, |d| d.get())),
        );

        let present: Vec<&String> = self.fields.upstream.iter().filter(|f| props.contains_key(*f)).collect();
        if !present.is_empty() {
            if segment.upstream_ids.len() > present.len() {
                tracing::warn!(
                    segment_id = %segment.id,
                    upstream = segment.upstream_ids.len(),
                    columns = present.len(),
                    "more upstream segments than upstream columns; extra ids not written"
                );
            }
            let mut upstream = segment.upstream_ids.iter().map(|u| u.get());
            for field in present {
                props.insert(field.clone(), json!(upstream.next().unwrap_or(-1)));
            }
        }

        Feature::new(props, segment.geometry.clone())
    }

    fn basin_feature(&self, basin: &Basin) -> Feature {
        let mut props: Map<String, Value> = basin.properties.clone();
        props.insert(self.fields.basin_id.clone(), json!(basin.id.get()));

        let area_field = self.fields.basin_area.as_deref().unwrap_or(DEFAULT_AREA_FIELD);
        if let Some(area) = basin.area {
            if basin.synthetic || self.fields.basin_area.is_some() {
                props.insert(area_field.to_string(), json!(area));
            }
        }
        if basin.synthetic {
            props.insert(SYNTHETIC_FLAG_FIELD.to_string(), json!(true));
        }

        Feature::new(props, basin.geometry.clone())
    }
}
