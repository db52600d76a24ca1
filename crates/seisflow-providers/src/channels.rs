//! Channels stage, web-service half (§4.5): builds the FDSN
//! station-level-channel POST body, fans a request out to each data
//! center, and parses/post-filters whatever comes back. DB fallback for
//! data centers that fail, and cross-DC dedup, are handled by
//! `seisflow-adapters` (they need persistence and the routing validator
//! respectively — this module stays I/O-only).

use std::time::Duration;

use chrono::{DateTime, Utc};
use seisflow_domain::wildcard::{location_for_wire, WildcardFilter};

use crate::parsing::{data_rows, parse_channel_row, RawChannelRow};

#[derive(Debug, Clone)]
pub struct ChannelFilterParams {
    pub network: WildcardFilter,
    pub station: WildcardFilter,
    pub location: WildcardFilter,
    pub channel: WildcardFilter,
    pub min_sample_rate: Option<f64>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Builds the POST body for an FDSN station service channel-level query.
/// Only positive (non-negated) patterns are sent (§4.5 step 1); `*` fills
/// in for an unconstrained field and an empty location is written `--`.
pub fn build_station_request_body(params: &ChannelFilterParams) -> String {
    let net = joined_or_star(&params.network);
    let sta = joined_or_star(&params.station);
    let loc = joined_or_star_location(&params.location);
    let cha = joined_or_star(&params.channel);
    format!(
        "format=text\nlevel=channel\n{} {} {} {} {} {}\n",
        net,
        sta,
        loc,
        cha,
        params.start.to_rfc3339(),
        params.end.to_rfc3339(),
    )
}

fn joined_or_star(f: &WildcardFilter) -> String {
    if f.outbound_patterns().is_empty() {
        "*".to_string()
    } else {
        f.outbound_patterns().join(",")
    }
}

fn joined_or_star_location(f: &WildcardFilter) -> String {
    if f.outbound_patterns().is_empty() {
        "*".to_string()
    } else {
        f.outbound_patterns().iter().map(|p| location_for_wire(p)).collect::<Vec<_>>().join(",")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelCandidate {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub latitude: f64,
    pub longitude: f64,
    pub sample_rate: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Parses a station-service response and applies the client-side
/// post-filter: negated patterns (never sent outbound) and the minimum
/// sample rate (§4.5 step 3).
pub fn parse_and_filter(text: &str, params: &ChannelFilterParams) -> Vec<ChannelCandidate> {
    data_rows(text)
        .filter_map(|fields| parse_channel_row(&fields))
        .filter(|row| {
            params.network.matches(&row.network)
                && params.station.matches(&row.station)
                && params.location.matches(if row.location.is_empty() { "--" } else { &row.location })
                && params.channel.matches(&row.channel)
                && params.min_sample_rate.map(|min| row.sample_rate >= min).unwrap_or(true)
        })
        .map(|row: RawChannelRow| ChannelCandidate {
            network: row.network,
            station: row.station,
            location: row.location,
            channel: row.channel,
            latitude: row.latitude,
            longitude: row.longitude,
            sample_rate: row.sample_rate,
            start_time: row.start_time,
            end_time: row.end_time,
        })
        .collect()
}

pub async fn fetch_channels_for_datacenter(
    client: &reqwest::Client,
    station_url: &str,
    params: &ChannelFilterParams,
    timeout: Duration,
) -> Result<Vec<ChannelCandidate>, String> {
    let body = build_station_request_body(params);
    let response = tokio::time::timeout(timeout, client.post(station_url).body(body).send())
        .await
        .map_err(|_| "timeout".to_string())?
        .map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        return Err(format!("http {}", response.status().as_u16()));
    }
    let text = response.text().await.map_err(|e| e.to_string())?;
    Ok(parse_and_filter(&text, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ChannelFilterParams {
        ChannelFilterParams {
            network: WildcardFilter::parse("*"),
            station: WildcardFilter::parse("*"),
            location: WildcardFilter::parse("*"),
            channel: WildcardFilter::parse("HH?,!HHZ"),
            min_sample_rate: Some(50.0),
            start: Utc::now() - chrono::Duration::days(1),
            end: Utc::now(),
        }
    }

    #[test]
    fn request_body_never_contains_negated_patterns() {
        let body = build_station_request_body(&params());
        assert!(!body.contains("!HHZ"));
        assert!(body.contains("HH?"));
    }

    #[test]
    fn post_filter_drops_negated_channel_and_low_sample_rate() {
        let text = "NET|STA|--|HHN|0|0|0|0|0|0|s|1|1|M/S|100.0|2020-01-01T00:00:00|\n\
                    NET|STA|--|HHZ|0|0|0|0|0|0|s|1|1|M/S|100.0|2020-01-01T00:00:00|\n\
                    NET|STA|--|HHE|0|0|0|0|0|0|s|1|1|M/S|10.0|2020-01-01T00:00:00|\n";
        let rows = parse_and_filter(text, &params());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].channel, "HHN");
    }
}
