//! GeoJSON input and output for stream networks and basins.
//!
//! Geometry and attributes are opaque: the loader lifts only the linkage
//! fields named in [`FieldNames`](crate::config::FieldNames) into the graph
//! and carries everything else through to the writer verbatim.

pub mod loader;
pub mod writer;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub use loader::{LoadError, LoadedNetwork, NetworkLoader};
pub use writer::{NetworkWriter, WriteError, WriteSummary};

/// GeoJSON `FeatureCollection`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    /// Always `"FeatureCollection"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Layer name written by GDAL-style drivers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Legacy CRS member, preserved verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<Value>,
    /// Features.
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Create a collection carrying another collection's name and CRS.
    pub fn with_meta(meta: &CollectionMeta, features: Vec<Feature>) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            name: meta.name.clone(),
            crs: meta.crs.clone(),
            features,
        }
    }

    /// Name and CRS of this collection.
    pub fn meta(&self) -> CollectionMeta {
        CollectionMeta { name: self.name.clone(), crs: self.crs.clone() }
    }
}

/// GeoJSON `Feature`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Always `"Feature"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Attributes; GeoJSON permits `null`.
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
    /// Geometry, untouched.
    #[serde(default)]
    pub geometry: Value,
}

impl Feature {
    /// Create a feature.
    pub fn new(properties: Map<String, Value>, geometry: Value) -> Self {
        Self {
            kind: "Feature".to_string(),
            properties: Some(properties),
            geometry,
        }
    }
}

/// Collection-level members restored on output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionMeta {
    /// Layer name.
    pub name: Option<String>,
    /// CRS member.
    pub crs: Option<Value>,
}

/// Serialize `value` as JSON to `path` via a temporary sibling and a rename.
///
/// On failure the temporary file is removed and `path` is left as it was.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    let tmp = temp_sibling(path);
    let result = write_json(&tmp, value).and_then(|()| fs::rename(&tmp, path));
    if result.is_err() && tmp.exists() {
        if let Err(e) = fs::remove_file(&tmp) {
            tracing::warn!(path = %tmp.display(), error = %e, "failed to remove temporary file");
        }
    }
    result
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut out, value)?;
    out.flush()
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}
