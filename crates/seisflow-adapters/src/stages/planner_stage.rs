//! Planner stage (§4.7): left-merges merge candidates against already
//! downloaded segments and decides what to (re)request.

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use seisflow_core::engine::{Stage, StageOutcome};
use seisflow_core::errors::{OrchestratorError, StageWarning};
use seisflow_domain::codes::RetryMask;
use seisflow_persistence::load_existing_segments;
use seisflow_policies::{plan, ExistingSegment, SegmentCandidate};

use crate::context::DownloadContext;

pub struct PlannerStage;

#[async_trait]
impl Stage<DownloadContext> for PlannerStage {
    fn name(&self) -> &'static str {
        "planner"
    }

    async fn run(&self, ctx: &mut DownloadContext) -> Result<StageOutcome, OrchestratorError> {
        let candidates: Vec<SegmentCandidate> = ctx
            .merge_candidates
            .iter()
            .map(|c| SegmentCandidate {
                channel_id: c.channel_id,
                event_id: c.event_id,
                datacenter_id: c.datacenter_id,
                event_distance_deg: c.event_distance_deg,
                arrival_time: c.arrival_time,
            })
            .collect();

        let channel_ids: Vec<i64> = {
            let mut ids: Vec<i64> = candidates.iter().map(|c| c.channel_id).collect();
            ids.sort_unstable();
            ids.dedup();
            ids
        };

        let connections = ctx.connections.clone();
        let existing_segments = tokio::task::spawn_blocking(move || -> Result<Vec<ExistingSegment>, OrchestratorError> {
            let mut conn = connections.connection().map_err(|e| OrchestratorError::Internal(e.to_string()))?;
            let rows = load_existing_segments(&mut conn, &channel_ids).map_err(|e| OrchestratorError::Internal(e.to_string()))?;
            Ok(rows
                .into_iter()
                .map(|s| ExistingSegment {
                    id: s.id.expect("persisted segment always has an id"),
                    channel_id: s.channel_id,
                    event_id: s.event_id,
                    request_start: s.request_start,
                    request_end: s.request_end,
                    download_code: s.download_code,
                })
                .collect())
        })
        .await
        .map_err(|e| OrchestratorError::Internal(format!("planner stage task panicked: {e}")))??;

        let retry_mask = RetryMask(ctx.config.retry_mask);
        let pre_arrival = ChronoDuration::minutes(ctx.config.pre_arrival_minutes);
        let post_arrival = ChronoDuration::minutes(ctx.config.post_arrival_minutes);

        let (planned, messages) = plan(&candidates, &existing_segments, retry_mask, pre_arrival, post_arrival);
        let warnings: Vec<StageWarning> = messages.into_iter().map(StageWarning::informational).collect();

        if planned.is_empty() {
            return Ok(StageOutcome::empty());
        }

        ctx.planned = planned;
        Ok(StageOutcome::with_warnings(warnings))
    }
}
