//! `DownloadContext` (§2, §5): the one mutable struct the six stages pass
//! through the engine, in the teacher's style of threading a single `Ctx`
//! rather than returning ad-hoc tuples between pipeline steps.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use seisflow_domain::entities::{Channel, DataCenter, Event, Station};
use seisflow_domain::interop::{MiniseedUnpacker, TravelTimeTable};
use seisflow_persistence::ConnectionProvider;
use seisflow_providers::DownloadStats;

use crate::config::RunConfig;

/// One resolved event↔channel pair, produced by the merge stage (§4.6) and
/// consumed by the planner stage (§4.7).
#[derive(Debug, Clone, Copy)]
pub struct MergeCandidate {
    pub channel_id: i64,
    pub event_id: i64,
    pub datacenter_id: i64,
    pub event_distance_deg: f64,
    pub arrival_time: DateTime<Utc>,
}

/// One channel as discovered by the channels stage, already persisted,
/// carrying the station fields the merge stage's geometry check needs.
#[derive(Debug, Clone)]
pub struct MergeableChannel {
    pub channel: Channel,
    pub datacenter_id: i64,
    pub network: String,
    pub station: String,
    pub station_latitude: f64,
    pub station_longitude: f64,
    pub station_start_time: DateTime<Utc>,
    pub station_end_time: Option<DateTime<Utc>>,
}

/// Threads every stage's inputs and outputs through one run (§5). Fields
/// are populated stage by stage; a stage never reads a field a later
/// stage alone is responsible for filling.
pub struct DownloadContext {
    pub config: RunConfig,
    pub client: reqwest::Client,
    pub connections: Arc<dyn ConnectionProvider>,
    pub travel_times: Arc<dyn TravelTimeTable>,
    pub unpacker: Arc<dyn MiniseedUnpacker>,
    /// Surrogate id of the `Download` row this run writes to (§3); bound
    /// to the engine's `run_id` by the driver before `PipelineEngine::run`.
    pub download_id: i64,

    // --- events stage output (§4.3) ---
    pub webservice_id: i64,
    pub events: Vec<Event>,

    // --- routing stage output (§4.4) ---
    pub datacenters: Vec<DataCenter>,
    pub dataselect_urls: HashMap<i64, String>,
    /// `Some` iff the routing response carried a station/channel map
    /// (§4.4 "validator is null" open question); consumed by the
    /// channels stage's cross-DC dedup.
    pub routing_validator: Option<HashMap<String, Vec<(String, String, String, String)>>>,

    // --- channels stage output (§4.5) ---
    pub channels: Vec<MergeableChannel>,

    // --- merge stage output (§4.6) ---
    pub merge_candidates: Vec<MergeCandidate>,

    // --- planner stage output (§4.7) ---
    pub planned: Vec<seisflow_policies::PlannedSegment>,

    // --- downloader stage output (§4.8) ---
    pub segments_written: usize,
    /// Per-(dataselect host, response code) count, aggregated across every
    /// group `download_all` issued this run (§4.8 "aggregates a matrix").
    pub download_stats: DownloadStats,
    pub stations_for_merge: Vec<Station>,
}

impl DownloadContext {
    pub fn new(
        config: RunConfig,
        client: reqwest::Client,
        connections: Arc<dyn ConnectionProvider>,
        travel_times: Arc<dyn TravelTimeTable>,
        unpacker: Arc<dyn MiniseedUnpacker>,
        download_id: i64,
    ) -> Self {
        Self {
            config,
            client,
            connections,
            travel_times,
            unpacker,
            download_id,
            webservice_id: 0,
            events: Vec::new(),
            datacenters: Vec::new(),
            dataselect_urls: HashMap::new(),
            routing_validator: None,
            channels: Vec::new(),
            merge_candidates: Vec::new(),
            planned: Vec::new(),
            segments_written: 0,
            download_stats: DownloadStats::new(),
            stations_for_merge: Vec::new(),
        }
    }
}
