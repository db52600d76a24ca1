//! Events stage (§4.3): one bisected FDSN event-text query, synced into
//! the `events` table.

use std::time::Duration;

use async_trait::async_trait;
use seisflow_core::engine::{Stage, StageOutcome};
use seisflow_core::errors::{OrchestratorError, StageWarning};
use seisflow_domain::entities::{Event, WebService, WebServiceType};
use seisflow_persistence::{sync_events, sync_web_services};
use seisflow_providers::{fetch_events, EventQuery};

use crate::context::DownloadContext;

pub struct EventsStage;

#[async_trait]
impl Stage<DownloadContext> for EventsStage {
    fn name(&self) -> &'static str {
        "events"
    }

    async fn run(&self, ctx: &mut DownloadContext) -> Result<StageOutcome, OrchestratorError> {
        let query = EventQuery {
            webservice_url: ctx.config.events_webservice_url.clone(),
            start: ctx.config.start,
            end: ctx.config.end,
            min_latitude: ctx.config.min_latitude,
            max_latitude: ctx.config.max_latitude,
            min_longitude: ctx.config.min_longitude,
            max_longitude: ctx.config.max_longitude,
            min_depth: ctx.config.min_depth,
            max_depth: ctx.config.max_depth,
            min_magnitude: ctx.config.min_magnitude,
            max_magnitude: ctx.config.max_magnitude,
        };
        let timeout = Duration::from_secs(ctx.config.http_timeout_secs);
        let result = fetch_events(&ctx.client, &query, timeout).await;

        let warnings: Vec<StageWarning> = result
            .sub_range_errors
            .iter()
            .map(|(start, end, err)| StageWarning::recoverable(format!("events sub-range [{start}, {end}] failed: {err}")))
            .collect();

        if result.events.is_empty() {
            return Err(OrchestratorError::NoEventsReturned);
        }

        let connections = ctx.connections.clone();
        let webservice_url = ctx.config.events_webservice_url.clone();
        let raw_events = result.events;

        let (webservice_id, persisted) = tokio::task::spawn_blocking(move || -> Result<(i64, Vec<Event>), OrchestratorError> {
            let mut conn = connections.connection().map_err(|e| OrchestratorError::Internal(e.to_string()))?;
            let (_, ws) = sync_web_services(&mut conn, &[WebService { id: None, kind: WebServiceType::Event, url: webservice_url }])
                .map_err(|e| OrchestratorError::Internal(e.to_string()))?;
            let webservice_id = ws[0].id.expect("sync_web_services always assigns an id");

            let events: Vec<Event> = raw_events
                .into_iter()
                .map(|r| Event {
                    id: None,
                    webservice_id,
                    event_id: r.event_id,
                    time: r.time,
                    latitude: r.latitude,
                    longitude: r.longitude,
                    depth_km: r.depth_km,
                    magnitude: r.magnitude,
                })
                .collect();
            let (_, persisted) = sync_events(&mut conn, &events).map_err(|e| OrchestratorError::Internal(e.to_string()))?;
            Ok((webservice_id, persisted))
        })
        .await
        .map_err(|e| OrchestratorError::Internal(format!("events stage task panicked: {e}")))??;

        if persisted.is_empty() {
            return Err(OrchestratorError::NoEventsReturned);
        }

        ctx.webservice_id = webservice_id;
        ctx.events = persisted;
        Ok(StageOutcome::with_warnings(warnings))
    }
}
