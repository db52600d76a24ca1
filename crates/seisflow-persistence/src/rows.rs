//! Diesel row shapes for §3's entities, plus conversions to/from the
//! domain-level structs in `seisflow_domain::entities`. Kept separate from
//! the domain crate so the domain stays free of any Diesel dependency.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use seisflow_domain::entities::{Channel, DataCenter, Download, Event, Organization, Segment, Station, WebService, WebServiceType};
use serde_json::Value;

use crate::schema::{channels, data_centers, downloads, events, pipeline_events, segments, stations, web_services};

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = web_services)]
pub struct WebServiceRow {
    pub id: i64,
    pub kind: String,
    pub url: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = web_services)]
pub struct NewWebServiceRow {
    pub kind: String,
    pub url: String,
}

impl From<&WebService> for NewWebServiceRow {
    fn from(w: &WebService) -> Self {
        Self { kind: kind_to_string(w.kind), url: w.url.clone() }
    }
}

fn kind_to_string(kind: WebServiceType) -> String {
    match kind {
        WebServiceType::Event => "event".to_string(),
    }
}

impl From<WebServiceRow> for WebService {
    fn from(r: WebServiceRow) -> Self {
        WebService { id: Some(r.id), kind: WebServiceType::Event, url: r.url }
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = data_centers)]
pub struct DataCenterRow {
    pub id: i64,
    pub station_url: String,
    pub dataselect_url: String,
    pub organization_name: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = data_centers)]
pub struct NewDataCenterRow {
    pub station_url: String,
    pub dataselect_url: String,
    pub organization_name: Option<String>,
}

impl From<&DataCenter> for NewDataCenterRow {
    fn from(d: &DataCenter) -> Self {
        Self { station_url: d.station_url.clone(), dataselect_url: d.dataselect_url.clone(), organization_name: d.organization_name.map(org_to_string) }
    }
}

fn org_to_string(o: Organization) -> String {
    match o {
        Organization::Eida => "eida".to_string(),
        Organization::Iris => "iris".to_string(),
        Organization::Other => "other".to_string(),
    }
}

fn string_to_org(s: &str) -> Option<Organization> {
    match s {
        "eida" => Some(Organization::Eida),
        "iris" => Some(Organization::Iris),
        "other" => Some(Organization::Other),
        _ => None,
    }
}

impl From<DataCenterRow> for DataCenter {
    fn from(r: DataCenterRow) -> Self {
        DataCenter {
            id: Some(r.id),
            station_url: r.station_url,
            dataselect_url: r.dataselect_url,
            organization_name: r.organization_name.as_deref().and_then(string_to_org),
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = events)]
pub struct EventRow {
    pub id: i64,
    pub webservice_id: i64,
    pub event_id: String,
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,
    pub magnitude: f64,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = events)]
pub struct NewEventRow {
    pub webservice_id: i64,
    pub event_id: String,
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,
    pub magnitude: f64,
}

impl From<&Event> for NewEventRow {
    fn from(e: &Event) -> Self {
        Self { webservice_id: e.webservice_id, event_id: e.event_id.clone(), time: e.time, latitude: e.latitude, longitude: e.longitude, depth_km: e.depth_km, magnitude: e.magnitude }
    }
}

impl From<EventRow> for Event {
    fn from(r: EventRow) -> Self {
        Event { id: Some(r.id), webservice_id: r.webservice_id, event_id: r.event_id, time: r.time, latitude: r.latitude, longitude: r.longitude, depth_km: r.depth_km, magnitude: r.magnitude }
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = stations)]
pub struct StationRow {
    pub id: i64,
    pub datacenter_id: i64,
    pub network: String,
    pub station: String,
    pub latitude: f64,
    pub longitude: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub inventory_xml: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = stations)]
pub struct NewStationRow {
    pub datacenter_id: i64,
    pub network: String,
    pub station: String,
    pub latitude: f64,
    pub longitude: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub inventory_xml: Option<Vec<u8>>,
}

impl From<&Station> for NewStationRow {
    fn from(s: &Station) -> Self {
        Self {
            datacenter_id: s.datacenter_id,
            network: s.network.clone(),
            station: s.station.clone(),
            latitude: s.latitude,
            longitude: s.longitude,
            start_time: s.start_time,
            end_time: s.end_time,
            inventory_xml: s.inventory_xml.clone(),
        }
    }
}

impl From<StationRow> for Station {
    fn from(r: StationRow) -> Self {
        Station {
            id: Some(r.id),
            datacenter_id: r.datacenter_id,
            network: r.network,
            station: r.station,
            latitude: r.latitude,
            longitude: r.longitude,
            start_time: r.start_time,
            end_time: r.end_time,
            inventory_xml: r.inventory_xml,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = channels)]
pub struct ChannelRow {
    pub id: i64,
    pub station_id: i64,
    pub location: String,
    pub channel: String,
    pub sample_rate: f64,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = channels)]
pub struct NewChannelRow {
    pub station_id: i64,
    pub location: String,
    pub channel: String,
    pub sample_rate: f64,
}

impl From<&Channel> for NewChannelRow {
    fn from(c: &Channel) -> Self {
        Self { station_id: c.station_id, location: c.location.clone(), channel: c.channel.clone(), sample_rate: c.sample_rate }
    }
}

impl From<ChannelRow> for Channel {
    fn from(r: ChannelRow) -> Self {
        Channel { id: Some(r.id), station_id: r.station_id, location: r.location, channel: r.channel, sample_rate: r.sample_rate }
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = segments)]
pub struct SegmentRow {
    pub id: i64,
    pub channel_id: i64,
    pub event_id: i64,
    pub datacenter_id: i64,
    pub download_id: i64,
    pub event_distance_deg: f64,
    pub arrival_time: DateTime<Utc>,
    pub request_start: DateTime<Utc>,
    pub request_end: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub sample_rate: Option<f64>,
    pub data: Option<Vec<u8>>,
    pub data_identifier: Option<String>,
    pub maxgap_numsamples: Option<f64>,
    pub download_code: Option<i32>,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = segments)]
pub struct NewSegmentRow {
    pub channel_id: i64,
    pub event_id: i64,
    pub datacenter_id: i64,
    pub download_id: i64,
    pub event_distance_deg: f64,
    pub arrival_time: DateTime<Utc>,
    pub request_start: DateTime<Utc>,
    pub request_end: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub sample_rate: Option<f64>,
    pub data: Option<Vec<u8>>,
    pub data_identifier: Option<String>,
    pub maxgap_numsamples: Option<f64>,
    pub download_code: Option<i32>,
}

impl From<&Segment> for NewSegmentRow {
    fn from(s: &Segment) -> Self {
        Self {
            channel_id: s.channel_id,
            event_id: s.event_id,
            datacenter_id: s.datacenter_id,
            download_id: s.download_id,
            event_distance_deg: s.event_distance_deg,
            arrival_time: s.arrival_time,
            request_start: s.request_start,
            request_end: s.request_end,
            start_time: s.start_time,
            end_time: s.end_time,
            sample_rate: s.sample_rate,
            data: s.data.clone(),
            data_identifier: s.data_identifier.clone(),
            maxgap_numsamples: s.maxgap_numsamples,
            download_code: s.download_code,
        }
    }
}

impl From<SegmentRow> for Segment {
    fn from(r: SegmentRow) -> Self {
        Segment {
            id: Some(r.id),
            channel_id: r.channel_id,
            event_id: r.event_id,
            datacenter_id: r.datacenter_id,
            download_id: r.download_id,
            event_distance_deg: r.event_distance_deg,
            arrival_time: r.arrival_time,
            request_start: r.request_start,
            request_end: r.request_end,
            start_time: r.start_time,
            end_time: r.end_time,
            sample_rate: r.sample_rate,
            data: r.data,
            data_identifier: r.data_identifier,
            maxgap_numsamples: r.maxgap_numsamples,
            download_code: r.download_code,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = downloads)]
pub struct DownloadRow {
    pub id: i64,
    pub run_time: DateTime<Utc>,
    pub config: String,
    pub config_hash: String,
    pub program_version: String,
    pub errors: i32,
    pub warnings: i32,
    pub log: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = downloads)]
pub struct NewDownloadRow {
    pub run_time: DateTime<Utc>,
    pub config: String,
    pub config_hash: String,
    pub program_version: String,
    pub errors: i32,
    pub warnings: i32,
    pub log: String,
}

impl From<&Download> for NewDownloadRow {
    fn from(d: &Download) -> Self {
        Self { run_time: d.run_time, config: d.config.clone(), config_hash: d.config_hash.clone(), program_version: d.program_version.clone(), errors: d.errors, warnings: d.warnings, log: d.log.clone() }
    }
}

impl From<DownloadRow> for Download {
    fn from(r: DownloadRow) -> Self {
        Download { id: Some(r.id), run_time: r.run_time, config: r.config, config_hash: r.config_hash, program_version: r.program_version, errors: r.errors, warnings: r.warnings, log: r.log }
    }
}

#[derive(Debug, Clone, Queryable)]
#[diesel(table_name = pipeline_events)]
pub struct PipelineEventRow {
    pub id: i64,
    pub download_id: i64,
    pub ts: DateTime<Utc>,
    pub kind: String,
    pub payload: Value,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pipeline_events)]
pub struct NewPipelineEventRow {
    pub download_id: i64,
    pub ts: DateTime<Utc>,
    pub kind: String,
    pub payload: Value,
}
