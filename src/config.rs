//! Run configuration.
//!
//! Load order: environment variables → defaults. Every variable is read
//! through a lookup closure so tests can supply their own environment.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `STREAMNET_INPUT_DIR` | required |
//! | `STREAMNET_OUTPUT_DIR` | required |
//! | `STREAMNET_REGIONS` | all regions |
//! | `STREAMNET_ALLOW_PARTIAL` | `false` |
//! | `STREAMNET_REPAIR_LENGTH` | `1.0` |
//! | `STREAMNET_ID_FIELD` | `LINKNO` |
//! | `STREAMNET_DS_FIELD` | `DSLINKNO` |
//! | `STREAMNET_LENGTH_FIELD` | `Length` |
//! | `STREAMNET_BASIN_ID_FIELD` | `streamID` |
//! | `STREAMNET_AREA_FIELD` | unset |

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::RepairPolicy;

/// Error type for configuration loading.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Required variable not set or empty.
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    /// Variable set to an unparseable value.
    #[error("Invalid value for {name}: {value:?}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Attribute names linking the stream and basin datasets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    /// Stream segment id.
    pub id: String,
    /// Next-downstream segment id; `-1` or null for outlets.
    pub downstream: String,
    /// Fixed-width upstream id columns, rewritten when present on a record.
    pub upstream: Vec<String>,
    /// Segment length.
    pub length: String,
    /// Basin key shared with the stream id.
    pub basin_id: String,
    /// Basin area, if the dataset has one.
    pub basin_area: Option<String>,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            id: "LINKNO".to_string(),
            downstream: "DSLINKNO".to_string(),
            upstream: vec!["USLINKNO1".to_string(), "USLINKNO2".to_string()],
            length: "Length".to_string(),
            basin_id: "streamID".to_string(),
            basin_area: None,
        }
    }
}

/// Configuration for a batch run over a directory of regions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Directory holding the input region files.
    pub input_dir: PathBuf,
    /// Directory receiving outputs, case tables and reports.
    pub output_dir: PathBuf,
    /// Regions to process; empty means all found.
    #[serde(default)]
    pub regions: Vec<u64>,
    /// Write outputs even when some segments could not be repaired.
    #[serde(default)]
    pub allow_partial: bool,
    /// Repair policy.
    #[serde(default)]
    pub policy: RepairPolicy,
    /// Attribute names.
    #[serde(default)]
    pub fields: FieldNames,
    /// File name prefix of stream network files.
    #[serde(default = "default_streams_prefix")]
    pub streams_prefix: String,
    /// File name prefix of basin files.
    #[serde(default = "default_basins_prefix")]
    pub basins_prefix: String,
}

fn default_streams_prefix() -> String {
    "TDX_streamnet".to_string()
}

fn default_basins_prefix() -> String {
    "TDX_streamreach_basins".to_string()
}

impl RunConfig {
    /// Create a config with defaults for everything but the directories.
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            regions: Vec::new(),
            allow_partial: false,
            policy: RepairPolicy::default(),
            fields: FieldNames::default(),
            streams_prefix: default_streams_prefix(),
            basins_prefix: default_basins_prefix(),
        }
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let input_dir = get("STREAMNET_INPUT_DIR").ok_or(ConfigError::Missing("STREAMNET_INPUT_DIR"))?;
        let output_dir = get("STREAMNET_OUTPUT_DIR").ok_or(ConfigError::Missing("STREAMNET_OUTPUT_DIR"))?;
        let mut config = Self::new(input_dir, output_dir);

        if let Some(regions) = get("STREAMNET_REGIONS") {
            config.regions = regions
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty() && *r != "*")
                .map(|r| {
                    r.parse::<u64>().map_err(|_| ConfigError::Invalid {
                        name: "STREAMNET_REGIONS",
                        value: regions.clone(),
                    })
                })
                .collect::<Result<_, _>>()?;
        }

        if let Some(flag) = get("STREAMNET_ALLOW_PARTIAL") {
            config.allow_partial = match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => return Err(ConfigError::Invalid { name: "STREAMNET_ALLOW_PARTIAL", value: flag }),
            };
        }

        if let Some(length) = get("STREAMNET_REPAIR_LENGTH") {
            config.policy.repair_length = length
                .parse::<f64>()
                .ok()
                .filter(|l| l.is_finite() && *l > 0.0)
                .ok_or(ConfigError::Invalid { name: "STREAMNET_REPAIR_LENGTH", value: length })?;
        }

        if let Some(v) = get("STREAMNET_ID_FIELD") {
            config.fields.id = v;
        }
        if let Some(v) = get("STREAMNET_DS_FIELD") {
            config.fields.downstream = v;
        }
        if let Some(v) = get("STREAMNET_LENGTH_FIELD") {
            config.fields.length = v;
        }
        if let Some(v) = get("STREAMNET_BASIN_ID_FIELD") {
            config.fields.basin_id = v;
        }
        config.fields.basin_area = get("STREAMNET_AREA_FIELD");

        Ok(config)
    }
}
