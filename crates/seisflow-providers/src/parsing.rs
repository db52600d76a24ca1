//! Shared FDSN text-response parsing (§6): `|`-delimited lines, header
//! ignored. Each service has its own column layout, so this module only
//! owns the bits common to all of them — splitting into lines/fields and
//! skipping the header/comment row.

use chrono::{DateTime, Utc};

/// Splits a `|`-delimited FDSN text response into field rows, dropping
/// blank lines and the header (any line starting with `#`).
pub fn data_rows(text: &str) -> impl Iterator<Item = Vec<&str>> {
    text.lines().filter(|l| !l.trim().is_empty() && !l.starts_with('#')).map(|l| l.split('|').map(str::trim).collect())
}

/// Parses an FDSN timestamp (`YYYY-MM-DDTHH:MM:SS[.ffffff]`, optionally
/// with a trailing `Z`) into a UTC instant.
pub fn parse_fdsn_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let normalized = if raw.ends_with('Z') { raw.to_string() } else { format!("{raw}Z") };
    DateTime::parse_from_rfc3339(&normalized)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
        })
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawEventRow {
    pub event_id: String,
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,
    pub magnitude: f64,
}

/// Parses one FDSN event-text row:
/// `EventID|Time|Latitude|Longitude|Depth/km|Author|Catalog|Contributor|
/// ContributorID|MagType|Magnitude|MagAuthor|EventLocationName`.
/// Rows with an unparseable or NaN critical field are dropped (§4.3),
/// hence `Option` rather than `Result`.
pub fn parse_event_row(fields: &[&str]) -> Option<RawEventRow> {
    if fields.len() < 11 {
        return None;
    }
    let event_id = fields[0].to_string();
    let time = parse_fdsn_time(fields[1])?;
    let latitude: f64 = fields[2].parse().ok()?;
    let longitude: f64 = fields[3].parse().ok()?;
    let depth_km: f64 = fields[4].parse().ok()?;
    let magnitude: f64 = fields[10].parse().ok()?;
    if [latitude, longitude, depth_km, magnitude].iter().any(|v| v.is_nan()) {
        return None;
    }
    Some(RawEventRow { event_id, time, latitude, longitude, depth_km, magnitude })
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawChannelRow {
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

/// Parses one FDSN station (`level=channel`, `format=text`) row:
/// `Network|Station|Location|Channel|Latitude|Longitude|Elevation|Depth|
/// Azimuth|Dip|SensorDescription|Scale|ScaleFreq|ScaleUnits|SampleRate|
/// StartTime|EndTime`.
pub fn parse_channel_row(fields: &[&str]) -> Option<RawChannelRow> {
    if fields.len() < 17 {
        return None;
    }
    let network = fields[0].to_string();
    let station = fields[1].to_string();
    // FDSN uses "--" on the wire for an empty location; normalize back to "".
    let location = if fields[2] == "--" { String::new() } else { fields[2].to_string() };
    let channel = fields[3].to_string();
    let latitude: f64 = fields[4].parse().ok()?;
    let longitude: f64 = fields[5].parse().ok()?;
    let sample_rate: f64 = fields[14].parse().ok()?;
    let start_time = parse_fdsn_time(fields[15])?;
    let end_time = parse_fdsn_time(fields[16]);
    Some(RawChannelRow { network, station, location, channel, latitude, longitude, sample_rate, start_time, end_time })
}
