//! seisflow-infra: the process driver (§2, §5): assembles the `Download`
//! row, binds a `PgEventStore` to a fresh run id, and sequences the six
//! `DownloadContext` stages through `seisflow-core`'s neutral engine.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use seisflow_adapters::stages::{ChannelsStage, DownloaderStage, EventsStage, MergeStage, PlannerStage, RoutingStage};
use seisflow_adapters::{DownloadContext, RunConfig};
use seisflow_core::engine::{PipelineEngine, RunReport, Stage};
use seisflow_core::errors::OrchestratorError;
use seisflow_domain::entities::Download;
use seisflow_domain::interop::{MiniseedUnpacker, TravelTimeTable};
use seisflow_persistence::{insert_download, update_download_counters, ConnectionProvider, PgEventStore};
use seisflow_providers::DownloadStats;
use uuid::Uuid;

pub const PROGRAM_VERSION: &str = env!("CARGO_PKG_VERSION");

/// What one invocation of [`run`] hands back to its caller.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub download_id: i64,
    pub report: RunReport,
    /// The downloader stage's §4.8 stats matrix; empty if the run stopped
    /// before the downloader stage ran.
    pub download_stats: DownloadStats,
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error("failed to prepare the download row: {0}")]
    Setup(String),
}

impl DriverError {
    /// Process exit code per §7: `OrchestratorError` maps through its own
    /// `exit_code`; a setup failure (before any stage ran) is always a
    /// hard 1, since it precedes the terminal/invalid-input/internal
    /// distinction those variants exist to draw.
    pub fn exit_code(&self) -> i32 {
        match self {
            DriverError::Orchestrator(e) => e.exit_code(),
            DriverError::Setup(_) => 1,
        }
    }
}

/// Runs one full pipeline invocation end to end: creates the `Download`
/// row, runs events -> routing -> channels -> merge -> planner ->
/// downloader, and stamps the final counters back onto that row
/// regardless of whether the run completed, stopped early, or failed.
pub async fn run(
    config: RunConfig,
    connections: Arc<dyn ConnectionProvider>,
    travel_times: Arc<dyn TravelTimeTable>,
    unpacker: Arc<dyn MiniseedUnpacker>,
) -> Result<RunOutcome, DriverError> {
    let download_row = Download {
        id: None,
        run_time: Utc::now(),
        config: config.to_yaml(),
        config_hash: config.config_hash(),
        program_version: PROGRAM_VERSION.to_string(),
        errors: 0,
        warnings: 0,
        log: String::new(),
    };

    let mut setup_conn = connections.connection().map_err(|e| DriverError::Setup(e.to_string()))?;
    let persisted = insert_download(&mut setup_conn, &download_row).map_err(|e| DriverError::Setup(e.to_string()))?;
    let download_id = persisted.id.expect("insert_download always assigns an id");
    drop(setup_conn);

    let event_conn = connections.connection().map_err(|e| DriverError::Setup(e.to_string()))?;
    let mut event_store = PgEventStore::new(event_conn);
    let run_id = Uuid::new_v4();
    event_store.bind(run_id, download_id);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()
        .map_err(|e| DriverError::Setup(e.to_string()))?;

    let mut ctx = DownloadContext::new(config, client, connections.clone(), travel_times, unpacker, download_id);

    let stages: Vec<Box<dyn Stage<DownloadContext>>> = vec![
        Box::new(EventsStage),
        Box::new(RoutingStage),
        Box::new(ChannelsStage),
        Box::new(MergeStage),
        Box::new(PlannerStage),
        Box::new(DownloaderStage),
    ];
    let engine = PipelineEngine::new(stages);

    let run_result = engine.run(&mut ctx, &mut event_store, run_id).await;

    let (errors, warnings) = match &run_result {
        Ok(report) => (0, report.total_warnings as i32),
        Err(_) => (1, 0),
    };
    let mut counters_conn = connections.connection().map_err(|e| DriverError::Setup(e.to_string()))?;
    if let Err(e) = update_download_counters(&mut counters_conn, download_id, errors, warnings, "") {
        log::warn!("failed to stamp final counters onto download {download_id}: {e}");
    }

    let report = run_result.map_err(DriverError::Orchestrator)?;
    Ok(RunOutcome { run_id, download_id, report, download_stats: ctx.download_stats })
}
