//! Multi-region batch driver.
//!
//! Processes every stream/basin file pair in an input directory, one region
//! at a time. A failing region is logged and skipped; the rest still run.
//!
//! ```text
//! TDX_streamnet_<region>_01.geojson ─┐
//!                                    ├→ load → case table → repair → report → write
//! TDX_streamreach_basins_<region>_01.geojson ─┘
//! ```

use regex_lite::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::classifier::classify_zero_length;
use crate::config::RunConfig;
use crate::engine::{RepairEngine, RepairError};
use crate::io::{write_json_atomic, LoadError, NetworkLoader, NetworkWriter, WriteError};
use crate::report::ReportSummary;

/// Error type for a single region or for directory discovery.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// Input directory could not be listed.
    #[error("Failed to scan {path}: {source}")]
    Scan {
        /// Directory path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Audit artifact or output directory could not be written.
    #[error("Failed to write {path}: {source}")]
    Artifact {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Input could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// Repair aborted.
    #[error(transparent)]
    Repair(#[from] RepairError),
    /// Output could not be written.
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Input files for one region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionFiles {
    /// Numeric region id parsed from the file names.
    pub region: u64,
    /// Stream network file.
    pub streams: PathBuf,
    /// Basin file.
    pub basins: PathBuf,
}

/// What happened to one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegionOutcome {
    /// Outputs already existed.
    Skipped,
    /// Repaired and written.
    Processed {
        /// Outcome counts.
        summary: ReportSummary,
    },
}

/// Result of a whole batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    /// Outcome per successfully handled region.
    pub regions: BTreeMap<u64, RegionOutcome>,
    /// Error message per failed region.
    pub failed: BTreeMap<u64, String>,
}

impl BatchSummary {
    /// Regions written with unrepaired segments, with their error counts.
    pub fn partial(&self) -> BTreeMap<u64, usize> {
        self.regions
            .iter()
            .filter_map(|(region, outcome)| match outcome {
                RegionOutcome::Processed { summary } if summary.errors > 0 => Some((*region, summary.errors)),
                _ => None,
            })
            .collect()
    }

    /// Whether every region was skipped or repaired without errors.
    ///
    /// Partial output written under `allow_partial` does not count as success.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.partial().is_empty()
    }
}

fn file_pattern(prefix: &str) -> Option<Regex> {
    let pattern = format!(r"^{}_(\d+)(?:_[^.]*)?\.(?:geo)?json$", regex_lite::escape(prefix));
    Regex::new(&pattern).ok()
}

/// Pair stream and basin files in the input directory by region id.
///
/// Regions with only one of the two files are logged and left out. The
/// result is ascending by region and honors the config's region filter.
pub fn discover_regions(config: &RunConfig) -> Result<Vec<RegionFiles>, BatchError> {
    let scan_err = |source| BatchError::Scan { path: config.input_dir.clone(), source };
    let (Some(streams_re), Some(basins_re)) =
        (file_pattern(&config.streams_prefix), file_pattern(&config.basins_prefix))
    else {
        return Err(scan_err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "file prefix does not form a valid pattern",
        )));
    };

    let mut names: Vec<String> = fs::read_dir(&config.input_dir)
        .map_err(scan_err)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    let mut pairs: BTreeMap<u64, (Option<PathBuf>, Option<PathBuf>)> = BTreeMap::new();
    for name in names {
        let (slot, caps) = if let Some(caps) = streams_re.captures(&name) {
            (0, caps)
        } else if let Some(caps) = basins_re.captures(&name) {
            (1, caps)
        } else {
            continue;
        };
        let Some(region) = caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok()) else {
            continue;
        };

        let entry = pairs.entry(region).or_default();
        let target = if slot == 0 { &mut entry.0 } else { &mut entry.1 };
        if target.is_some() {
            tracing::warn!(region, file = %name, "more than one file for region; keeping the first");
            continue;
        }
        *target = Some(config.input_dir.join(&name));
    }

    let mut regions = Vec::new();
    for (region, pair) in pairs {
        if !config.regions.is_empty() && !config.regions.contains(&region) {
            continue;
        }
        match pair {
            (Some(streams), Some(basins)) => regions.push(RegionFiles { region, streams, basins }),
            (streams, basins) => tracing::warn!(
                region,
                has_streams = streams.is_some(),
                has_basins = basins.is_some(),
                "incomplete region file pair; skipping"
            ),
        }
    }

    Ok(regions)
}

/// Output path for an input file.
fn output_path(config: &RunConfig, input: &Path) -> PathBuf {
    match input.file_name() {
        Some(name) => config.output_dir.join(name),
        None => config.output_dir.join(input),
    }
}

/// Load, audit, repair and write one region.
pub fn process_region(config: &RunConfig, files: &RegionFiles) -> Result<RegionOutcome, BatchError> {
    let out_streams = output_path(config, &files.streams);
    let out_basins = output_path(config, &files.basins);
    if out_streams.exists() && out_basins.exists() {
        tracing::info!(region = files.region, "outputs exist; skipping region");
        return Ok(RegionOutcome::Skipped);
    }

    fs::create_dir_all(&config.output_dir)
        .map_err(|source| BatchError::Artifact { path: config.output_dir.clone(), source })?;

    tracing::info!(
        region = files.region,
        streams = %files.streams.display(),
        basins = %files.basins.display(),
        "processing region"
    );

    let loaded = NetworkLoader::new(config.fields.clone()).load(&files.streams, &files.basins)?;

    let table = classify_zero_length(&loaded.graph).map_err(RepairError::from)?;
    if !table.is_empty() {
        let path = config.output_dir.join(format!("zero_length_cases_{}.json", files.region));
        write_json_atomic(&path, &table).map_err(|source| BatchError::Artifact { path, source })?;
    }

    let mut graph = loaded.graph;
    let report = RepairEngine::new(config.policy.clone()).repair(&mut graph)?;

    let report_path = config.output_dir.join(format!("repair_report_{}.json", files.region));
    write_json_atomic(&report_path, &report)
        .map_err(|source| BatchError::Artifact { path: report_path, source })?;

    for (id, snapshot) in report.errors() {
        tracing::error!(
            region = files.region,
            segment_id = %id,
            upstream = ?snapshot.upstream_ids,
            downstream = ?snapshot.downstream_id,
            "unrepaired zero-length segment"
        );
    }

    NetworkWriter::new(config.fields.clone())
        .allow_partial(config.allow_partial)
        .with_unmatched_basins(loaded.unmatched_basins)
        .write(
            &graph,
            &report,
            (&out_streams, &loaded.streams_meta),
            (&out_basins, &loaded.basins_meta),
        )?;

    Ok(RegionOutcome::Processed { summary: report.summary() })
}

/// Process every discovered region, continuing past failures.
pub fn run_batch(config: &RunConfig) -> Result<BatchSummary, BatchError> {
    let regions = discover_regions(config)?;
    tracing::info!(count = regions.len(), input_dir = %config.input_dir.display(), "discovered regions");

    let mut summary = BatchSummary::default();
    for files in &regions {
        match process_region(config, files) {
            Ok(outcome) => {
                summary.regions.insert(files.region, outcome);
            }
            Err(e) => {
                tracing::error!(region = files.region, error = %e, "region failed");
                summary.failed.insert(files.region, e.to_string());
            }
        }
    }

    tracing::info!(
        processed = summary.regions.len(),
        partial = summary.partial().len(),
        failed = summary.failed.len(),
        "all regions processed"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_pattern() {
        let re = file_pattern("TDX_streamnet").unwrap();
        let caps = re.captures("TDX_streamnet_7020000010_01.geojson").unwrap();
        assert_eq!(&caps[1], "7020000010");
        assert!(re.is_match("TDX_streamnet_12.json"));
        assert!(!re.is_match("TDX_streamreach_basins_12_01.geojson"));
        assert!(!re.is_match("TDX_streamnet_12_01.gpkg"));
    }

    #[test]
    fn test_discover_pairs_regions() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "TDX_streamnet_200_01.geojson",
            "TDX_streamreach_basins_200_01.geojson",
            "TDX_streamnet_100_01.geojson",
            "TDX_streamreach_basins_100_01.geojson",
            "TDX_streamnet_300_01.geojson",
            "notes.txt",
        ] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }

        let config = RunConfig::new(dir.path(), dir.path().join("out"));
        let regions = discover_regions(&config).unwrap();
        let ids: Vec<u64> = regions.iter().map(|r| r.region).collect();
        assert_eq!(ids, vec![100, 200]);
        assert!(regions[0].basins.ends_with("TDX_streamreach_basins_100_01.geojson"));

        let mut filtered = config.clone();
        filtered.regions = vec![200];
        assert_eq!(discover_regions(&filtered).unwrap().len(), 1);
    }

    #[test]
    fn test_partial_regions_are_not_success() {
        let mut summary = BatchSummary::default();
        summary.regions.insert(1, RegionOutcome::Skipped);
        summary.regions.insert(
            2,
            RegionOutcome::Processed { summary: ReportSummary { deleted: 1, fixed: 2, errors: 0 } },
        );
        assert!(summary.is_success());
        assert!(summary.partial().is_empty());

        summary.regions.insert(
            3,
            RegionOutcome::Processed { summary: ReportSummary { deleted: 0, fixed: 0, errors: 2 } },
        );
        assert!(!summary.is_success());
        assert_eq!(summary.partial().into_iter().collect::<Vec<_>>(), vec![(3, 2)]);
    }

    #[test]
    fn test_discover_missing_directory() {
        let config = RunConfig::new("/nonexistent/streamnet/input", "/tmp/out");
        assert!(matches!(discover_regions(&config), Err(BatchError::Scan { .. })));
    }
}
