//! Routing stage (§4.4): resolves which data centers serve which
//! network/station/channel tuples.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use seisflow_domain::url::{rewrite_fdsn_url, FdsnService};
use thiserror::Error;

pub const IRIS_STATION_URL: &str = "https://service.iris.edu/fdsnws/station/1/query";
pub const IRIS_DATASELECT_URL: &str = "https://service.iris.edu/fdsnws/dataselect/1/query";

#[derive(Debug, Clone)]
pub enum RoutingMode {
    /// A single FDSN base URL (either service works; the sibling is
    /// derived by rewriting).
    Explicit(String),
    Iris,
    Eida { routing_url: String },
}

#[derive(Debug, Clone)]
pub struct RoutingQuery {
    pub mode: RoutingMode,
    /// Raw FDSN `channel=` filter value, e.g. `"*"` or `"BH?,HH?"`.
    pub channel_filter: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// One resolved data center, not yet persisted (no surrogate id).
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedDataCenter {
    pub station_url: String,
    pub dataselect_url: String,
}

pub type ChannelTuple = (String, String, String, String); // net, sta, loc, cha

#[derive(Debug, Clone, Default)]
pub struct RoutingResult {
    pub data_centers: Vec<RoutedDataCenter>,
    /// `dataselect_url` -> channel tuples the routing service said that DC
    /// serves. Empty for `Explicit`/`Iris` (no validator, §4.4).
    pub station_channel_map: HashMap<String, Vec<ChannelTuple>>,
}

impl RoutingResult {
    /// `true` for `Explicit`/`Iris` modes and for an EIDA response that
    /// came back with no parsed blocks: callers must not build a
    /// validator from an empty map (§4.4 "validator is null").
    pub fn has_validator(&self) -> bool {
        !self.station_channel_map.is_empty()
    }
}

#[derive(Debug, Error, Clone)]
pub enum RoutingError {
    #[error("malformed routing base URL: {0}")]
    InvalidUrl(String),
    #[error("routing service network error: {0}")]
    Network(String),
    #[error("routing service returned http {0}")]
    Http(u16),
}

pub async fn resolve_routing(
    client: &reqwest::Client,
    query: &RoutingQuery,
    timeout: Duration,
) -> Result<RoutingResult, RoutingError> {
    match &query.mode {
        RoutingMode::Explicit(base) => {
            let station_url =
                rewrite_fdsn_url(base, FdsnService::Station).map_err(|_| RoutingError::InvalidUrl(base.clone()))?;
            let dataselect_url =
                rewrite_fdsn_url(base, FdsnService::Dataselect).map_err(|_| RoutingError::InvalidUrl(base.clone()))?;
            Ok(RoutingResult {
                data_centers: vec![RoutedDataCenter { station_url, dataselect_url }],
                station_channel_map: HashMap::new(),
            })
        }
        RoutingMode::Iris => Ok(RoutingResult {
            data_centers: vec![RoutedDataCenter {
                station_url: IRIS_STATION_URL.to_string(),
                dataselect_url: IRIS_DATASELECT_URL.to_string(),
            }],
            station_channel_map: HashMap::new(),
        }),
        RoutingMode::Eida { routing_url } => fetch_eida_routing(client, routing_url, query, timeout).await,
    }
}

async fn fetch_eida_routing(
    client: &reqwest::Client,
    routing_url: &str,
    query: &RoutingQuery,
    timeout: Duration,
) -> Result<RoutingResult, RoutingError> {
    let body = format!(
        "service=dataselect\nformat=post\nchannel={}\nstart={}\nend={}\n",
        query.channel_filter,
        query.start.to_rfc3339(),
        query.end.to_rfc3339(),
    );

    let response = tokio::time::timeout(timeout, client.post(routing_url).body(body).send())
        .await
        .map_err(|_| RoutingError::Network("timeout".into()))?
        .map_err(|e| RoutingError::Network(e.to_string()))?;

    if !response.status().is_success() {
        return Err(RoutingError::Http(response.status().as_u16()));
    }

    let text = response.text().await.map_err(|e| RoutingError::Network(e.to_string()))?;
    Ok(parse_eida_routing_response(&text))
}

/// Parses the EIDA routing response (§6): blocks separated by a blank
/// line, first non-blank line of each block is the dataselect URL,
/// subsequent lines are `NET STA LOC CHA START END`.
fn parse_eida_routing_response(text: &str) -> RoutingResult {
    let mut data_centers = Vec::new();
    let mut station_channel_map: HashMap<String, Vec<ChannelTuple>> = HashMap::new();

    for block in text.split("\n\n") {
        let mut lines = block.lines().filter(|l| !l.trim().is_empty());
        let Some(dataselect_url) = lines.next() else { continue };
        let dataselect_url = dataselect_url.trim().to_string();
        let station_url = match rewrite_fdsn_url(&dataselect_url, FdsnService::Station) {
            Ok(u) => u,
            Err(_) => continue,
        };

        let mut tuples = Vec::new();
        for line in lines {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                continue;
            }
            let loc = if fields[2] == "--" { String::new() } else { fields[2].to_string() };
            tuples.push((fields[0].to_string(), fields[1].to_string(), loc, fields[3].to_string()));
        }

        data_centers.push(RoutedDataCenter { station_url, dataselect_url: dataselect_url.clone() });
        station_channel_map.insert(dataselect_url, tuples);
    }

    RoutingResult { data_centers, station_channel_map }
}
