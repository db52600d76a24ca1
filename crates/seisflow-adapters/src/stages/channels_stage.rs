//! Channels stage (§4.5): per-data-center station/channel discovery, DB
//! fallback for data centers whose request failed, and cross-DC dedup.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use seisflow_core::engine::{Stage, StageOutcome};
use seisflow_core::errors::{OrchestratorError, StageWarning};
use seisflow_domain::entities::{Channel, Station};
use seisflow_domain::wildcard::WildcardFilter;
use seisflow_persistence::{load_channels_matching, sync_channels, sync_stations};
use seisflow_policies::{dedup_across_datacenters, ChannelRow as DedupRow};
use seisflow_providers::{fetch_channels_for_datacenter, ChannelFilterParams};

use crate::context::{DownloadContext, MergeableChannel};

pub struct ChannelsStage;

#[derive(Debug, Clone)]
struct Discovered {
    station_latitude: f64,
    station_longitude: f64,
    sample_rate: f64,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
}

#[async_trait]
impl Stage<DownloadContext> for ChannelsStage {
    fn name(&self) -> &'static str {
        "channels"
    }

    async fn run(&self, ctx: &mut DownloadContext) -> Result<StageOutcome, OrchestratorError> {
        let params = ChannelFilterParams {
            network: WildcardFilter::parse(&ctx.config.network),
            station: WildcardFilter::parse(&ctx.config.station),
            location: WildcardFilter::parse(&ctx.config.location),
            channel: WildcardFilter::parse(&ctx.config.channel),
            min_sample_rate: ctx.config.min_sample_rate,
            start: ctx.config.start,
            end: ctx.config.end,
        };
        let timeout = Duration::from_secs(ctx.config.http_timeout_secs);

        let mut rows: Vec<DedupRow<Discovered>> = Vec::new();
        let mut warnings = Vec::new();

        let fetches = ctx.datacenters.iter().map(|dc| {
            let params = params.clone();
            let client = ctx.client.clone();
            let station_url = dc.station_url.clone();
            let dc_id = dc.id.expect("persisted data center always has an id");
            async move {
                let result = fetch_channels_for_datacenter(&client, &station_url, &params, timeout).await;
                (dc_id, result)
            }
        });
        let live_results = futures::future::join_all(fetches).await;

        let mut failed_datacenters = Vec::new();
        for (dc_id, result) in live_results {
            match result {
                Ok(candidates) => {
                    for c in candidates {
                        rows.push(DedupRow {
                            datacenter_id: dc_id,
                            network: c.network,
                            station: c.station,
                            location: c.location,
                            channel: c.channel,
                            start_time: c.start_time,
                            payload: Discovered {
                                station_latitude: c.latitude,
                                station_longitude: c.longitude,
                                sample_rate: c.sample_rate,
                                start_time: c.start_time,
                                end_time: c.end_time,
                            },
                        });
                    }
                }
                Err(e) => {
                    warnings.push(StageWarning::recoverable(format!("data center {dc_id} channel request failed: {e}")));
                    failed_datacenters.push(dc_id);
                }
            }
        }

        if !failed_datacenters.is_empty() {
            let connections = ctx.connections.clone();
            let network = params.network.clone();
            let station = params.station.clone();
            let location = params.location.clone();
            let channel = params.channel.clone();
            let min_sample_rate = params.min_sample_rate;
            let fallback = tokio::task::spawn_blocking(move || -> Result<Vec<(i64, seisflow_persistence::ChannelWithStation)>, OrchestratorError> {
                let mut conn = connections.connection().map_err(|e| OrchestratorError::Internal(e.to_string()))?;
                let mut out = Vec::new();
                for dc_id in failed_datacenters {
                    let found = load_channels_matching(&mut conn, dc_id, &network, &station, &location, &channel, min_sample_rate)
                        .map_err(|e| OrchestratorError::Internal(e.to_string()))?;
                    out.extend(found.into_iter().map(|cs| (dc_id, cs)));
                }
                Ok(out)
            })
            .await
            .map_err(|e| OrchestratorError::Internal(format!("channels DB fallback panicked: {e}")))??;

            for (dc_id, cs) in fallback {
                rows.push(DedupRow {
                    datacenter_id: dc_id,
                    network: cs.station.network.clone(),
                    station: cs.station.station.clone(),
                    location: cs.channel.location.clone(),
                    channel: cs.channel.channel.clone(),
                    start_time: cs.station.start_time,
                    payload: Discovered {
                        station_latitude: cs.station.latitude,
                        station_longitude: cs.station.longitude,
                        sample_rate: cs.channel.sample_rate,
                        start_time: cs.station.start_time,
                        end_time: cs.station.end_time,
                    },
                });
            }
        }

        if rows.is_empty() {
            return Err(OrchestratorError::NoStationsReturned);
        }

        let routing_validator = ctx.routing_validator.clone();
        let dataselect_urls = ctx.dataselect_urls.clone();
        let validator_fn = routing_validator.map(|map| {
            move |dc_id: i64, net: &str, sta: &str, loc: &str, cha: &str| -> bool {
                dataselect_urls
                    .get(&dc_id)
                    .and_then(|url| map.get(url))
                    .map(|tuples| tuples.iter().any(|(n, s, l, c)| n == net && s == sta && l == loc && c == cha))
                    .unwrap_or(false)
            }
        });
        let validator: Option<&dyn Fn(i64, &str, &str, &str, &str) -> bool> = validator_fn.as_ref().map(|f| f as &dyn Fn(i64, &str, &str, &str, &str) -> bool);

        let network_station_pairs: Vec<(String, String)> =
            rows.iter().map(|r| (r.network.clone(), r.station.clone())).collect();
        let connections = ctx.connections.clone();
        let preferred: HashMap<(String, String), i64> = tokio::task::spawn_blocking(move || -> Result<HashMap<(String, String), i64>, OrchestratorError> {
            let mut conn = connections.connection().map_err(|e| OrchestratorError::Internal(e.to_string()))?;
            use seisflow_persistence::schema::stations::dsl;
            let rows: Vec<(String, String, i64)> = dsl::stations
                .select((dsl::network, dsl::station, dsl::datacenter_id))
                .load(&mut conn)
                .map_err(|e| OrchestratorError::Internal(e.to_string()))?;
            Ok(rows
                .into_iter()
                .filter(|(n, s, _)| network_station_pairs.contains(&(n.clone(), s.clone())))
                .map(|(n, s, d)| ((n, s), d))
                .collect())
        })
        .await
        .map_err(|e| OrchestratorError::Internal(format!("channels DB preference lookup panicked: {e}")))??;

        let db_preferred = move |net: &str, sta: &str| preferred.get(&(net.to_string(), sta.to_string())).copied();
        let survivors = dedup_across_datacenters(rows, validator, &db_preferred);

        if survivors.is_empty() {
            return Ok(StageOutcome::empty());
        }

        let mut station_keys: Vec<(String, String, DateTime<Utc>)> = Vec::new();
        let mut new_stations = Vec::new();
        for row in &survivors {
            let key = (row.network.clone(), row.station.clone(), row.payload.start_time);
            if !station_keys.contains(&key) {
                station_keys.push(key.clone());
                new_stations.push(Station {
                    id: None,
                    datacenter_id: row.datacenter_id,
                    network: row.network.clone(),
                    station: row.station.clone(),
                    latitude: row.payload.station_latitude,
                    longitude: row.payload.station_longitude,
                    start_time: row.payload.start_time,
                    end_time: row.payload.end_time,
                    inventory_xml: None,
                });
            }
        }

        let connections = ctx.connections.clone();
        let persisted_stations = tokio::task::spawn_blocking(move || -> Result<Vec<Station>, OrchestratorError> {
            let mut conn = connections.connection().map_err(|e| OrchestratorError::Internal(e.to_string()))?;
            let (_, persisted) = sync_stations(&mut conn, &new_stations).map_err(|e| OrchestratorError::Internal(e.to_string()))?;
            Ok(persisted)
        })
        .await
        .map_err(|e| OrchestratorError::Internal(format!("station sync panicked: {e}")))??;

        let station_id_by_key: HashMap<(String, String, DateTime<Utc>), i64> = persisted_stations
            .iter()
            .filter_map(|s| s.id.map(|id| ((s.network.clone(), s.station.clone(), s.start_time), id)))
            .collect();

        let mut new_channels = Vec::new();
        let mut channel_meta = Vec::new();
        for row in &survivors {
            let key = (row.network.clone(), row.station.clone(), row.payload.start_time);
            let Some(&station_id) = station_id_by_key.get(&key) else { continue };
            new_channels.push(Channel { id: None, station_id, location: row.location.clone(), channel: row.channel.clone(), sample_rate: row.payload.sample_rate });
            channel_meta.push((station_id, row.datacenter_id, row.network.clone(), row.station.clone(), row.payload.station_latitude, row.payload.station_longitude, row.payload.start_time, row.payload.end_time));
        }

        let connections = ctx.connections.clone();
        let persisted_channels = tokio::task::spawn_blocking(move || -> Result<Vec<Channel>, OrchestratorError> {
            let mut conn = connections.connection().map_err(|e| OrchestratorError::Internal(e.to_string()))?;
            let (_, persisted) = sync_channels(&mut conn, &new_channels).map_err(|e| OrchestratorError::Internal(e.to_string()))?;
            Ok(persisted)
        })
        .await
        .map_err(|e| OrchestratorError::Internal(format!("channel sync panicked: {e}")))??;

        let mut mergeable = Vec::new();
        for channel in persisted_channels {
            if let Some(meta) = channel_meta.iter().find(|m| m.0 == channel.station_id) {
                let (_, dc_id, network, station, lat, lon, start, end) = meta.clone();
                mergeable.push(MergeableChannel {
                    channel,
                    datacenter_id: dc_id,
                    network,
                    station,
                    station_latitude: lat,
                    station_longitude: lon,
                    station_start_time: start,
                    station_end_time: end,
                });
            }
        }

        ctx.stations_for_merge = persisted_stations;
        ctx.channels = mergeable;
        Ok(StageOutcome::with_warnings(warnings))
    }
}
