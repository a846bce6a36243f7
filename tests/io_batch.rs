//! End-to-end tests over GeoJSON files in temporary directories.

use std::fs;
use std::path::Path;

use serde_json::{json, Value};
use streamnet_repair::batch::{discover_regions, process_region};
use streamnet_repair::io::loader::read_collection;
use streamnet_repair::{
    run_batch, NetworkLoader, NetworkView, RegionOutcome, RunConfig, SegmentId,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn stream(id: i64, ds: i64, length: f64) -> Value {
    json!({
        "type": "Feature",
        "properties": {
            "LINKNO": id,
            "DSLINKNO": ds,
            "USLINKNO1": -1,
            "USLINKNO2": -1,
            "Length": length,
            "strmOrder": 2
        },
        "geometry": { "type": "LineString", "coordinates": [[id as f64, 0.0], [id as f64, 1.0]] }
    })
}

fn basin(id: i64) -> Value {
    json!({
        "type": "Feature",
        "properties": { "streamID": id },
        "geometry": { "type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]] }
    })
}

fn write_collection(path: &Path, name: &str, features: Vec<Value>) {
    let fc = json!({
        "type": "FeatureCollection",
        "name": name,
        "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:OGC:1.3:CRS84" } },
        "features": features
    });
    fs::write(path, serde_json::to_string(&fc).unwrap()).unwrap();
}

/// Region with one of each repair case.
///
/// ```text
///  1   2
///   \ /
///    3 (0)      6 (0)     7 (0)
///    |                    |
///    4 (0)                8
/// ```
fn write_clean_region(dir: &Path, region: u64) {
    write_collection(
        &dir.join(format!("TDX_streamnet_{region}_01.geojson")),
        "streams",
        vec![
            stream(1, 3, 10.0),
            stream(2, 3, 12.0),
            stream(3, 4, 0.0),
            stream(4, -1, 0.0),
            stream(6, -1, 0.0),
        ],
    );
    write_collection(
        &dir.join(format!("TDX_streamreach_basins_{region}_01.geojson")),
        "basins",
        vec![basin(1), basin(2), basin(4), basin(6)],
    );
}

fn write_region_with_headwater(dir: &Path, region: u64) {
    write_collection(
        &dir.join(format!("TDX_streamnet_{region}_01.geojson")),
        "streams",
        vec![stream(7, 8, 0.0), stream(8, -1, 5.0)],
    );
    write_collection(
        &dir.join(format!("TDX_streamreach_basins_{region}_01.geojson")),
        "basins",
        vec![basin(7), basin(8)],
    );
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Single region
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_region_round_trip() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_clean_region(input.path(), 101);

    let config = RunConfig::new(input.path(), output.path());
    let regions = discover_regions(&config).unwrap();
    assert_eq!(regions.len(), 1);

    let outcome = process_region(&config, &regions[0]).unwrap();
    let RegionOutcome::Processed { summary } = outcome else {
        panic!("region was skipped");
    };
    assert_eq!((summary.deleted, summary.fixed, summary.errors), (1, 2, 0));

    let streams_out = output.path().join("TDX_streamnet_101_01.geojson");
    let basins_out = output.path().join("TDX_streamreach_basins_101_01.geojson");
    let reloaded = NetworkLoader::default().load(&streams_out, &basins_out).unwrap();
    let graph = &reloaded.graph;

    assert_eq!(graph.segment_ids(), vec![SegmentId::new(1), SegmentId::new(2), SegmentId::new(3), SegmentId::new(4)]);
    assert!(graph.zero_length_ids().is_empty());
    assert!(graph.basin_of(SegmentId::new(3)).is_some());
    assert!(graph.basin_of(SegmentId::new(6)).is_none());
    assert_eq!(reloaded.streams_meta.name.as_deref(), Some("streams"));
    assert!(reloaded.streams_meta.crs.is_some());

    let streams = read_collection(&streams_out).unwrap();
    let confluence = streams.features[2].properties.as_ref().unwrap();
    assert_eq!(confluence["USLINKNO1"], 1);
    assert_eq!(confluence["USLINKNO2"], 2);
    assert_eq!(confluence["strmOrder"], 2);
    assert_eq!(streams.features[2].geometry["type"], "LineString");

    let basins = read_json(&basins_out);
    let synthetic: Vec<&Value> = basins["features"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|f| f["properties"]["synthetic"] == true)
        .collect();
    assert_eq!(synthetic.len(), 1);
    assert_eq!(synthetic[0]["properties"]["streamID"], 3);
    assert!(synthetic[0]["geometry"].is_null());

    let cases = read_json(&output.path().join("zero_length_cases_101.json"));
    assert_eq!(cases["isolated"], json!([6]));
    assert_eq!(cases["confluence"], json!([3]));
    assert_eq!(cases["outlet"], json!([4]));

    let report = read_json(&output.path().join("repair_report_101.json"));
    assert_eq!(report["outcomes"]["6"]["outcome"], "deleted");
    assert_eq!(report["outcomes"]["3"]["outcome"], "fixed");
    assert_ne!(report["fingerprint_before"], report["fingerprint_after"]);
}

#[test]
fn test_existing_outputs_skip_region() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_clean_region(input.path(), 5);
    fs::write(output.path().join("TDX_streamnet_5_01.geojson"), "{}").unwrap();
    fs::write(output.path().join("TDX_streamreach_basins_5_01.geojson"), "{}").unwrap();

    let config = RunConfig::new(input.path(), output.path());
    let regions = discover_regions(&config).unwrap();

    assert_eq!(process_region(&config, &regions[0]).unwrap(), RegionOutcome::Skipped);
    assert!(!output.path().join("repair_report_5.json").exists());
}

#[test]
fn test_basin_without_stream_passes_through() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_collection(
        &input.path().join("TDX_streamnet_8_01.geojson"),
        "streams",
        vec![stream(1, -1, 5.0)],
    );
    write_collection(
        &input.path().join("TDX_streamreach_basins_8_01.geojson"),
        "basins",
        vec![basin(1), basin(0)],
    );

    let config = RunConfig::new(input.path(), output.path());
    let summary = run_batch(&config).unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.regions.keys().copied().collect::<Vec<_>>(), vec![8]);
    let basins = read_json(&output.path().join("TDX_streamreach_basins_8_01.geojson"));
    let keys: Vec<i64> = basins["features"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["properties"]["streamID"].as_i64().unwrap())
        .collect();
    assert_eq!(keys, vec![0, 1]);
    assert_eq!(basins["features"][0]["geometry"]["type"], "Polygon");
}

// ─────────────────────────────────────────────────────────────────────────────
// Batch runs
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_batch_continues_past_failed_region() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_clean_region(input.path(), 1);
    write_region_with_headwater(input.path(), 2);
    write_clean_region(input.path(), 3);
    // Broken region: downstream link to a missing segment.
    write_collection(
        &input.path().join("TDX_streamnet_4_01.geojson"),
        "streams",
        vec![stream(1, 99, 5.0)],
    );
    write_collection(&input.path().join("TDX_streamreach_basins_4_01.geojson"), "basins", vec![]);

    let config = RunConfig::new(input.path(), output.path());
    let summary = run_batch(&config).unwrap();

    assert!(!summary.is_success());
    assert_eq!(summary.failed.keys().copied().collect::<Vec<_>>(), vec![2, 4]);
    assert_eq!(summary.regions.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
    assert!(summary.failed[&2].contains("unrepaired"));

    // Region 2 still leaves its audit trail but no outputs.
    assert!(output.path().join("repair_report_2.json").exists());
    assert!(!output.path().join("TDX_streamnet_2_01.geojson").exists());
    assert!(output.path().join("TDX_streamnet_3_01.geojson").exists());
}

#[test]
fn test_allow_partial_writes_unrepaired_region() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_region_with_headwater(input.path(), 2);

    let mut config = RunConfig::new(input.path(), output.path());
    config.allow_partial = true;
    let summary = run_batch(&config).unwrap();

    assert!(summary.failed.is_empty());
    assert!(!summary.is_success());
    assert_eq!(summary.partial().into_iter().collect::<Vec<_>>(), vec![(2, 1)]);
    let streams = read_json(&output.path().join("TDX_streamnet_2_01.geojson"));
    assert_eq!(streams["features"][0]["properties"]["Length"], 0.0);
    let report = read_json(&output.path().join("repair_report_2.json"));
    assert_eq!(report["outcomes"]["7"]["outcome"], "error");
    assert_eq!(report["outcomes"]["7"]["snapshot"]["downstream_id"], 8);
}

#[test]
fn test_region_filter() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_clean_region(input.path(), 10);
    write_clean_region(input.path(), 20);

    let mut config = RunConfig::new(input.path(), output.path());
    config.regions = vec![20];
    let summary = run_batch(&config).unwrap();

    assert_eq!(summary.regions.keys().copied().collect::<Vec<_>>(), vec![20]);
    assert!(!output.path().join("repair_report_10.json").exists());
}
