//! Routing stage (§4.4): resolves data centers for the run's channel
//! filter, falling back to previously-known data centers if the routing
//! service itself is unreachable.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use seisflow_core::engine::{Stage, StageOutcome};
use seisflow_core::errors::{OrchestratorError, StageWarning};
use seisflow_domain::entities::DataCenter;
use seisflow_persistence::{load_datacenters, sync_data_centers};
use seisflow_providers::{resolve_routing, RoutingQuery, RoutingResult};

use crate::context::DownloadContext;

pub struct RoutingStage;

#[async_trait]
impl Stage<DownloadContext> for RoutingStage {
    fn name(&self) -> &'static str {
        "routing"
    }

    async fn run(&self, ctx: &mut DownloadContext) -> Result<StageOutcome, OrchestratorError> {
        let query = RoutingQuery {
            mode: ctx.config.routing.to_mode(),
            channel_filter: ctx.config.channel.clone(),
            start: ctx.config.start,
            end: ctx.config.end,
        };
        let timeout = Duration::from_secs(ctx.config.http_timeout_secs);

        let (result, warnings) = match resolve_routing(&ctx.client, &query, timeout).await {
            Ok(result) => (result, Vec::new()),
            Err(e) => {
                let connections = ctx.connections.clone();
                let existing = tokio::task::spawn_blocking(move || -> Result<Vec<DataCenter>, OrchestratorError> {
                    let mut conn = connections.connection().map_err(|e| OrchestratorError::Internal(e.to_string()))?;
                    load_datacenters(&mut conn).map_err(|e| OrchestratorError::Internal(e.to_string()))
                })
                .await
                .map_err(|e| OrchestratorError::Internal(format!("routing DB fallback panicked: {e}")))??;

                if existing.is_empty() {
                    return Err(OrchestratorError::RoutingUnavailable { webservice_url: ctx.config.events_webservice_url.clone() });
                }

                let warning = StageWarning::recoverable(format!("routing service unavailable ({e}), falling back to {} known data center(s)", existing.len()));
                (RoutingResult { data_centers: existing.into_iter().map(|d| seisflow_providers::RoutedDataCenter { station_url: d.station_url, dataselect_url: d.dataselect_url }).collect(), station_channel_map: HashMap::new() }, vec![warning])
            }
        };

        if result.data_centers.is_empty() {
            return Err(OrchestratorError::RoutingUnavailable { webservice_url: ctx.config.events_webservice_url.clone() });
        }

        let has_validator = result.has_validator();
        let rows: Vec<DataCenter> = result
            .data_centers
            .iter()
            .map(|dc| DataCenter { id: None, station_url: dc.station_url.clone(), dataselect_url: dc.dataselect_url.clone(), organization_name: None })
            .collect();

        let connections = ctx.connections.clone();
        let persisted = tokio::task::spawn_blocking(move || -> Result<Vec<DataCenter>, OrchestratorError> {
            let mut conn = connections.connection().map_err(|e| OrchestratorError::Internal(e.to_string()))?;
            let (_, persisted) = sync_data_centers(&mut conn, &rows).map_err(|e| OrchestratorError::Internal(e.to_string()))?;
            Ok(persisted)
        })
        .await
        .map_err(|e| OrchestratorError::Internal(format!("routing stage task panicked: {e}")))??;

        let dataselect_urls: HashMap<i64, String> =
            persisted.iter().filter_map(|d| d.id.map(|id| (id, d.dataselect_url.clone()))).collect();

        ctx.datacenters = persisted;
        ctx.dataselect_urls = dataselect_urls;
        ctx.routing_validator = if has_validator { Some(result.station_channel_map) } else { None };

        Ok(StageOutcome::with_warnings(warnings))
    }
}
