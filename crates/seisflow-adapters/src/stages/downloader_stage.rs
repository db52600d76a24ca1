//! Downloader stage (§4.8): issues the planned dataselect requests,
//! classifies every record, and streams the result into `segments`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use seisflow_core::engine::{Stage, StageOutcome};
use seisflow_core::errors::OrchestratorError;
use seisflow_domain::entities::Segment;
use seisflow_persistence::SegmentUpserter;
use seisflow_providers::{download_all, DownloadRow, DownloaderParams};

use crate::context::DownloadContext;

pub struct DownloaderStage;

#[async_trait]
impl Stage<DownloadContext> for DownloaderStage {
    fn name(&self) -> &'static str {
        "downloader"
    }

    async fn run(&self, ctx: &mut DownloadContext) -> Result<StageOutcome, OrchestratorError> {
        if ctx.planned.is_empty() {
            return Ok(StageOutcome::empty());
        }

        let channel_meta: HashMap<i64, (String, String, String, String)> = ctx
            .channels
            .iter()
            .filter_map(|c| c.channel.id.map(|id| (id, (c.network.clone(), c.station.clone(), c.channel.location.clone(), c.channel.channel.clone()))))
            .collect();

        let rows: Vec<DownloadRow> = ctx
            .planned
            .iter()
            .enumerate()
            .filter_map(|(row_index, p)| {
                let (network, station, location, channel) = channel_meta.get(&p.channel_id)?.clone();
                Some(DownloadRow {
                    row_index,
                    datacenter_id: p.datacenter_id,
                    network,
                    station,
                    location,
                    channel,
                    request_start: p.request_start,
                    request_end: p.request_end,
                })
            })
            .collect();

        let params = DownloaderParams { timeout: Duration::from_secs(ctx.config.http_timeout_secs) };
        let (outcomes, stats) = download_all(&ctx.client, rows, &ctx.dataselect_urls, ctx.unpacker.as_ref(), &params).await;

        let mut segments = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            let Some(planned) = ctx.planned.get(outcome.row_index) else { continue };
            let (network, station, location, channel) = channel_meta.get(&planned.channel_id).cloned().unwrap_or_default();
            let loc = if location.is_empty() { "--" } else { &location };
            segments.push(Segment {
                id: planned.existing_id,
                channel_id: planned.channel_id,
                event_id: planned.event_id,
                datacenter_id: planned.datacenter_id,
                download_id: ctx.download_id,
                event_distance_deg: planned.event_distance_deg,
                arrival_time: planned.arrival_time,
                request_start: planned.request_start,
                request_end: planned.request_end,
                start_time: outcome.start_time,
                end_time: outcome.end_time,
                sample_rate: outcome.sample_rate,
                data: if outcome.data.is_empty() { None } else { Some(outcome.data) },
                data_identifier: Some(format!("{network}.{station}.{loc}.{channel}")),
                maxgap_numsamples: outcome.maxgap_numsamples,
                download_code: outcome.download_code,
            });
        }

        let connections = ctx.connections.clone();
        let buffer_size = ctx.config.segment_flush_batch_size;
        let written = tokio::task::spawn_blocking(move || -> Result<usize, OrchestratorError> {
            let mut conn = connections.connection().map_err(|e| OrchestratorError::Internal(e.to_string()))?;
            let mut upserter = SegmentUpserter::new(&mut conn, buffer_size);
            for segment in segments {
                upserter.push(segment).map_err(|e| OrchestratorError::Internal(e.to_string()))?;
            }
            let stats = upserter.close().map_err(|e| OrchestratorError::Internal(e.to_string()))?;
            Ok(stats.total_persisted())
        })
        .await
        .map_err(|e| OrchestratorError::Internal(format!("downloader stage task panicked: {e}")))??;

        ctx.segments_written = written;
        ctx.download_stats = stats;
        Ok(StageOutcome::ok())
    }
}
