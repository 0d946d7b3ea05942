//! Schema Graph Build Binary
//!
//! Runs one full pass of the schema manager over a configuration file and
//! writes the generated modules to an output directory.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `SCHEMA_GRAPH_CONFIG`: Path to the manager config (or pass it as the first argument)
//! - `SCHEMA_GRAPH_OUT_DIR`: Module output directory (default: .schema-graph)
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! Relative input paths are resolved against the config file's directory.
//!
//! ## Usage
//!
//! ```bash
//! LOG_FORMAT=pretty cargo run --bin schema_graph_build --features cli -- schemas.json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use schema_graph_kernel::{FileLoader, FsModuleStore, ManagerConfig, SchemaManager};

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "schema_graph_build=info,schema_graph_kernel=info".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .flatten_event(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    info!(
        version = schema_graph_kernel::KERNEL_VERSION,
        "Starting schema graph build"
    );

    match run().await {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            warn!(failed = failed, "Schema graph build finished with failures");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "Schema graph build aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<usize, Box<dyn std::error::Error>> {
    let config_path: PathBuf = std::env::var("SCHEMA_GRAPH_CONFIG")
        .ok()
        .or_else(|| std::env::args().nth(1))
        .ok_or("no config given: set SCHEMA_GRAPH_CONFIG or pass a path")?
        .into();
    let out_dir: PathBuf = std::env::var("SCHEMA_GRAPH_OUT_DIR")
        .unwrap_or_else(|_| ".schema-graph".to_string())
        .into();

    let config = ManagerConfig::from_json_file(&config_path)?;
    info!(
        config = %config_path.display(),
        out_dir = %out_dir.display(),
        surfaces = config.surfaces.len(),
        "Configuration loaded"
    );

    let base_dir = config_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default();
    let loader = Arc::new(FileLoader::with_base_dir(base_dir));
    let store = Arc::new(FsModuleStore::new(out_dir));
    let manager = SchemaManager::new(config, loader, store)?;

    let started = Instant::now();
    let report = manager.process_all().await?;

    for failure in &report.failures {
        error!(
            surface = %failure.surface,
            input = %failure.input,
            error = %failure.error,
            "Version failed to build"
        );
    }
    for input in &report.processed {
        if let Some(module) = manager.module_for_input(input) {
            info!(input = %input, module = %module.specifier(), "Module written");
        }
    }

    info!(
        processed = report.processed.len(),
        failed = report.failures.len(),
        tracked_files = manager.tracked_files().len(),
        latency_ms = started.elapsed().as_millis() as u64,
        "Schema graph build complete"
    );

    Ok(report.failures.len())
}
