//! Merge stage (§4.6): binds events to channels by great-circle distance,
//! magnitude-scaled radius, station time coverage, and travel-time arrival.

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use seisflow_core::engine::{Stage, StageOutcome};
use seisflow_core::errors::{OrchestratorError, StageWarning};
use seisflow_policies::{angular_distance_deg, station_covers_event};

use crate::context::{DownloadContext, MergeCandidate};

pub struct MergeStage;

#[async_trait]
impl Stage<DownloadContext> for MergeStage {
    fn name(&self) -> &'static str {
        "merge"
    }

    async fn run(&self, ctx: &mut DownloadContext) -> Result<StageOutcome, OrchestratorError> {
        let mut candidates = Vec::new();
        let mut warnings = Vec::new();

        for mergeable in &ctx.channels {
            let channel_id = mergeable.channel.id.expect("persisted channel always has an id");
            for event in &ctx.events {
                let event_id = event.id.expect("persisted event always has an id");
                let distance = angular_distance_deg(mergeable.station_latitude, mergeable.station_longitude, event.latitude, event.longitude);
                let radius = ctx.config.radius_schedule.radius_deg(event.magnitude);
                if distance > radius {
                    continue;
                }
                if !station_covers_event(mergeable.station_start_time, mergeable.station_end_time, event.time) {
                    continue;
                }
                let Some(arrival_seconds) = ctx.travel_times.p_arrival(event.depth_km, distance) else {
                    warnings.push(StageWarning::informational(format!(
                        "no travel-time coverage for depth {:.1}km / distance {:.2}deg (event {event_id}, channel {channel_id})",
                        event.depth_km, distance
                    )));
                    continue;
                };
                let arrival_time = event.time + ChronoDuration::microseconds((arrival_seconds * 1_000_000.0).round() as i64);

                candidates.push(MergeCandidate {
                    channel_id,
                    event_id,
                    datacenter_id: mergeable.datacenter_id,
                    event_distance_deg: distance,
                    arrival_time,
                });
            }
        }

        if candidates.is_empty() {
            return Ok(StageOutcome::empty());
        }

        ctx.merge_candidates = candidates;
        Ok(StageOutcome::with_warnings(warnings))
    }
}
