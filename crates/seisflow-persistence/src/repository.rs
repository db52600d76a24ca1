//! Read/write helpers that don't fit the natural-key sync contract:
//! loading a `DataCenter` table wholesale, the channels-stage DB fallback
//! (§4.5 step 4), existing-segment lookups for the planner (§4.7), and the
//! `Download` row's own lifecycle.

use diesel::pg::PgConnection;
use diesel::prelude::*;
use seisflow_domain::entities::{Channel, DataCenter, Download, Segment, Station};
use seisflow_domain::wildcard::WildcardFilter;

use crate::error::PersistenceError;
use crate::rows::{ChannelRow, DataCenterRow, DownloadRow, NewDownloadRow, SegmentRow, StationRow};
use crate::schema::{channels, data_centers, downloads, segments, stations};

pub fn load_datacenters(conn: &mut PgConnection) -> Result<Vec<DataCenter>, PersistenceError> {
    let rows: Vec<DataCenterRow> = data_centers::table.load(conn)?;
    Ok(rows.into_iter().map(DataCenter::from).collect())
}

/// One already-known channel, joined back to its station for the wildcard
/// filter and geometry the channels stage needs (§4.5 step 4, §4.6).
#[derive(Debug, Clone)]
pub struct ChannelWithStation {
    pub channel: Channel,
    pub station: Station,
}

/// DB fallback for data centers whose web request failed (§4.5 step 4):
/// loads already-known channels for that DC matching the same wildcard
/// filters used for the live query, translating `*`/`?`/`!` to SQL.
pub fn load_channels_matching(
    conn: &mut PgConnection,
    datacenter_id: i64,
    network: &WildcardFilter,
    station: &WildcardFilter,
    location: &WildcardFilter,
    channel: &WildcardFilter,
    min_sample_rate: Option<f64>,
) -> Result<Vec<ChannelWithStation>, PersistenceError> {
    let station_rows: Vec<StationRow> = stations::table.filter(stations::datacenter_id.eq(datacenter_id)).load(conn)?;

    let mut out = Vec::new();
    for station_row in station_rows {
        if !network.matches(&station_row.network) || !station.matches(&station_row.station) {
            continue;
        }
        let channel_rows: Vec<ChannelRow> = channels::table.filter(channels::station_id.eq(station_row.id)).load(conn)?;
        for channel_row in channel_rows {
            let loc = if channel_row.location.is_empty() { "--" } else { &channel_row.location };
            if !location.matches(loc) || !channel.matches(&channel_row.channel) {
                continue;
            }
            if min_sample_rate.map(|min| channel_row.sample_rate >= min).unwrap_or(true) {
                out.push(ChannelWithStation { channel: channel_row.clone().into(), station: station_row.clone().into() });
            }
        }
    }
    Ok(out)
}

/// Existing segments for the given channel ids (§4.7 step 1): the
/// planner's left-merge lookup table.
pub fn load_existing_segments(conn: &mut PgConnection, channel_ids: &[i64]) -> Result<Vec<Segment>, PersistenceError> {
    let rows: Vec<SegmentRow> = segments::table.filter(segments::channel_id.eq_any(channel_ids)).load(conn)?;
    Ok(rows.into_iter().map(Segment::from).collect())
}

pub fn insert_download(conn: &mut PgConnection, download: &Download) -> Result<Download, PersistenceError> {
    let new_row = NewDownloadRow::from(download);
    let row: DownloadRow = diesel::insert_into(downloads::table).values(&new_row).get_result(conn)?;
    Ok(row.into())
}

/// Stamps final counters and the rendered event log onto a `Download` row
/// at the end of a run.
pub fn update_download_counters(conn: &mut PgConnection, download_id: i64, errors: i32, warnings: i32, log: &str) -> Result<(), PersistenceError> {
    diesel::update(downloads::table.find(download_id))
        .set((downloads::errors.eq(errors), downloads::warnings.eq(warnings), downloads::log.eq(log)))
        .execute(conn)?;
    Ok(())
}
