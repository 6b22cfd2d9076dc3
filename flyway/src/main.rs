//! Flyway service binary.
//!
//! Subcommands:
//! - `serve`: HTTP API for detection cycles, allocation plans, the
//!   signal log, and network inference (the default when no subcommand
//!   is given).
//! - `cycle`: one detector + allocator pass over a case batch file,
//!   printing the emitted signals and the budget split.
//! - `infer`: one-shot network inference over a case batch file.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use flyway_advisor::advise;
use flyway_api::jobs::JobRegistry;
use flyway_api::routes::create_router;
use flyway_api::{ApiConfig, ApiState};
use flyway_core::case::Case;
use flyway_core::config::Config;
use flyway_core::geo::{CellId, GridPartition};
use flyway_core::signal::DetectionSignal;
use flyway_detection::{periods_from_batch, DetectionEngine, DetectorConfig};
use flyway_ingestion::{CaseNormalizer, RawCaseReport};
use flyway_network::{InferenceConfig, NetworkInference};
use flyway_sampling::{AllocationPlan, AllocatorConfig, ThompsonAllocator};
use flyway_storage::MemoryStorage;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[clap(
    name = "flyway",
    version,
    about = "Sequential outbreak detection and transmission network inference"
)]
struct Cli {
    /// Configuration file path
    #[clap(short, long, default_value = "config/flyway.yaml", global = true)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[clap(long, env = "FLYWAY_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Enable JSON logging
    #[clap(long, env = "FLYWAY_LOG_JSON", global = true)]
    log_json: bool,

    /// Validate configuration and exit
    #[clap(long, global = true)]
    dry_run: bool,

    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the surveillance service (default when no subcommand is given)
    Serve,
    /// Run one detector and allocator pass over a case batch
    Cycle {
        /// Case report file (JSON array)
        #[clap(long)]
        cases: PathBuf,

        /// Sampling budget to apportion for the cycle
        #[clap(long, default_value_t = 100)]
        budget: u32,

        /// Cycle number recorded on the allocation plan
        #[clap(long, default_value_t = 0)]
        cycle: u64,
    },
    /// Infer a transmission network from a case batch
    Infer {
        /// Case report file (JSON array)
        #[clap(long)]
        cases: PathBuf,

        /// Also print the intervention recommendation
        #[clap(long)]
        recommend: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    info!("Starting flyway v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli.config)?;

    if cli.dry_run {
        info!("Dry run mode - configuration validated, exiting");
        return Ok(());
    }

    match cli.command {
        Some(Commands::Cycle {
            cases,
            budget,
            cycle,
        }) => run_cycle_command(&config, &cases, budget, cycle),
        Some(Commands::Infer { cases, recommend }) => {
            run_infer_command(&config, &cases, recommend)
        }
        Some(Commands::Serve) | None => run_serve_command(&config).await,
    }
}

/// Initialize logging based on CLI arguments
fn init_logging(cli: &Cli) -> Result<()> {
    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .context("Invalid log level")?;

    if cli.log_json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .with(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive(log_level.into()),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true),
            )
            .with(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive(log_level.into()),
            )
            .init();
    }

    Ok(())
}

/// Load configuration, falling back to defaults when the file is
/// absent so the offline subcommands work out of the box.
fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        info!("Loading configuration from {}", path.display());
        Config::from_file(path).context("Failed to load configuration")
    } else {
        warn!(
            "Configuration file {} not found, using defaults",
            path.display()
        );
        Ok(Config::default())
    }
}

/// Run the serve subcommand (default behavior)
async fn run_serve_command(config: &Config) -> Result<()> {
    let grid = GridPartition::new(config.grid.cell_size_km)?;
    let inference = InferenceConfig::from_section(&config.inference)?;
    let detector = DetectorConfig::from_section(&config.detection)?;
    let allocator = AllocatorConfig::from_section(&config.sampling)?;

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install metrics recorder")?;

    let state = ApiState {
        storage: Arc::new(MemoryStorage::new()),
        detector: Arc::new(DetectionEngine::new(detector)),
        allocator: Arc::new(ThompsonAllocator::new(allocator)),
        inference: Arc::new(NetworkInference::new(inference)),
        normalizer: Arc::new(CaseNormalizer::new(grid)),
        jobs: Arc::new(JobRegistry::new()),
        sync_case_limit: config.inference.sync_case_limit,
    };
    let api_config = ApiConfig::from_server(&config.server, config.inference.sync_case_limit);
    let app = create_router(&api_config, state, Some(metrics_handle));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server bind address")?;

    info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Cannot bind {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server failed")?;

    info!("API server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("Received Ctrl+C, shutting down..."); },
        _ = terminate => { info!("Received SIGTERM, shutting down..."); },
    }
}

/// Output of the `cycle` subcommand.
#[derive(Debug, Serialize)]
struct CycleReport {
    signals: Vec<DetectionSignal>,
    plan: AllocationPlan,
    /// Cells whose history inside the batch was too short to test.
    skipped_cells: Vec<CellId>,
}

/// Run one detector and allocator pass over a case batch.
///
/// The batch's span is divided into daily periods per cell. The final
/// day is the period under test; every earlier day feeds the cell's
/// baseline.
fn run_cycle_command(config: &Config, path: &Path, budget: u32, cycle: u64) -> Result<()> {
    let grid = GridPartition::new(config.grid.cell_size_km)?;
    let normalizer = CaseNormalizer::new(grid);
    let detector = DetectorConfig::from_section(&config.detection)?;
    let allocator = ThompsonAllocator::new(AllocatorConfig::from_section(&config.sampling)?);
    let engine = DetectionEngine::new(detector.clone());

    let cases = read_case_batch(&normalizer, path)?;
    let batch = periods_from_batch(&cases, detector.min_baseline_periods)?;
    if batch.span_start == batch.period {
        bail!("Case batch spans a single day; no baseline history to fit");
    }
    let mut states = batch.fitted;

    info!(
        cells = states.len(),
        skipped = batch.skipped.len(),
        period = %batch.period,
        "Running detection cycle"
    );

    let signals = engine.run_cycle(&mut states, &batch.counts)?;

    let last_alarms: HashMap<CellId, DateTime<Utc>> = signals
        .iter()
        .filter(|s| s.is_alarm())
        .map(|s| (s.cell_id.clone(), s.emitted_at))
        .collect();
    allocator.update_posteriors(&mut states, &last_alarms, Utc::now());
    let plan = allocator.allocate(&states, budget, cycle)?;

    let report = CycleReport {
        signals,
        plan,
        skipped_cells: batch.skipped,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Infer a transmission network from a case batch and print it.
fn run_infer_command(config: &Config, path: &Path, recommend: bool) -> Result<()> {
    let grid = GridPartition::new(config.grid.cell_size_km)?;
    let normalizer = CaseNormalizer::new(grid);
    let inference = NetworkInference::new(InferenceConfig::from_section(&config.inference)?);

    let cases = read_case_batch(&normalizer, path)?;
    let network = inference.infer(&cases)?;

    info!(
        network_id = %network.network_id,
        nodes = network.metrics.node_count,
        edges = network.metrics.edge_count,
        components = network.metrics.component_count,
        "Network inferred"
    );

    println!("{}", serde_json::to_string_pretty(&network)?);
    if recommend {
        let recommendation = advise(&network);
        println!("{}", serde_json::to_string_pretty(&recommendation)?);
    }
    Ok(())
}

/// Read and normalize a JSON array of raw case reports.
fn read_case_batch(normalizer: &CaseNormalizer, path: &Path) -> Result<Vec<Case>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    let reports: Vec<RawCaseReport> =
        serde_json::from_str(&raw).context("Case batch must be a JSON array of case reports")?;
    reports
        .into_iter()
        .map(|report| normalizer.normalize(report).map_err(Into::into))
        .collect()
}
