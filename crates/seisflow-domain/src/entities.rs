//! Persistent entities (§3). Surrogate ids are `i64` (Postgres `BIGSERIAL`,
//! matching the teacher's `event_log.seq` convention); `None` means "not yet
//! assigned a row" — the DB sync engine (`seisflow-persistence::sync`) fills
//! it in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `WebService.type`. Only `event` is used by this spec; the enum exists so
/// the column stays self-describing if a station/dataselect webservice row
/// is ever tracked the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebServiceType {
    Event,
}

/// Identity of a remote catalog/dataselect endpoint. Immutable after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebService {
    pub id: Option<i64>,
    pub kind: WebServiceType,
    pub url: String,
}

/// Organization hint for a `DataCenter`; informational only, never used for
/// routing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Organization {
    Eida,
    Iris,
    Other,
}

/// Identity of one FDSN data center. Immutable after insert; unique on
/// `dataselect_url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataCenter {
    pub id: Option<i64>,
    pub station_url: String,
    pub dataselect_url: String,
    pub organization_name: Option<Organization>,
}

/// A seismic event from a catalog query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Option<i64>,
    pub webservice_id: i64,
    /// Natural id as reported by the catalog, unique together with
    /// `webservice_id`.
    pub event_id: String,
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,
    pub magnitude: f64,
}

/// A recording station. Natural key: `(network, station, start_time)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: Option<i64>,
    pub datacenter_id: i64,
    pub network: String,
    pub station: String,
    pub latitude: f64,
    pub longitude: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Filled in a dedicated late phase; deliberately excluded from the
    /// update-columns set whenever a `Station` row is re-synced (§4.5).
    pub inventory_xml: Option<Vec<u8>>,
}

/// One sensor stream at a station. Natural key:
/// `(station_id, location, channel)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Option<i64>,
    pub station_id: i64,
    /// FDSN location code; `""` is normalized to `"--"` on the wire but
    /// stored as `""` here (empty string is the canonical in-memory form).
    pub location: String,
    pub channel: String,
    pub sample_rate: f64,
}

/// One time-bounded waveform record for a `(channel, event)` pair. Natural
/// identity for retry purposes is `(channel_id, event_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: Option<i64>,
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

impl Segment {
    /// `true` iff this row's `download_code` belongs to the given retry
    /// mask, treating `None` as `seg_not_found` per §4.7.
    pub fn matches_retry_mask(&self, mask: crate::codes::RetryMask) -> bool {
        crate::codes::code_in_mask(self.download_code, mask)
    }
}

/// One pipeline run. Counters are updated at the end of the run; `log` is
/// the rendered `PipelineEvent` trail (ambient, see SPEC_FULL.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Download {
    pub id: Option<i64>,
    pub run_time: DateTime<Utc>,
    /// YAML rendering of the run's `RunConfig` (ambient persistence
    /// concern — not parsed here, only stored).
    pub config: String,
    pub config_hash: String,
    pub program_version: String,
    pub errors: i32,
    pub warnings: i32,
    pub log: String,
}
