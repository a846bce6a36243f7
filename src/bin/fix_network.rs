//! Zero-length segment repair over a directory of regions.
//!
//! ## Configuration
//!
//! Environment variables (see [`RunConfig`] for the full list):
//! - `STREAMNET_INPUT_DIR`: directory of region GeoJSON files (required)
//! - `STREAMNET_OUTPUT_DIR`: directory receiving repaired files and reports (required)
//! - `STREAMNET_REGIONS`: comma-separated region ids (default: all)
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: pretty)
//!
//! ## Usage
//!
//! ```bash
//! STREAMNET_INPUT_DIR=/data/tdx STREAMNET_OUTPUT_DIR=/data/fixed cargo run --release --bin fix_network
//! ```

use std::process::ExitCode;
use std::time::Instant;

use tracing::{error, info};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use streamnet_repair::{run_batch, RunConfig};

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fix_network=info,streamnet_repair=info".into());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

fn main() -> ExitCode {
    init_tracing();

    let config = match RunConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::from(2);
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        input_dir = %config.input_dir.display(),
        output_dir = %config.output_dir.display(),
        allow_partial = config.allow_partial,
        repair_length = config.policy.repair_length,
        "Starting network repair"
    );

    let started = Instant::now();
    let summary = match run_batch(&config) {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "batch aborted");
            return ExitCode::FAILURE;
        }
    };

    for (region, message) in &summary.failed {
        error!(region = *region, error = %message, "region not repaired");
    }
    for (region, errors) in summary.partial() {
        error!(region, errors, "region written with unrepaired segments");
    }

    info!(
        regions = summary.regions.len(),
        partial = summary.partial().len(),
        failed = summary.failed.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Network repair finished"
    );

    if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
