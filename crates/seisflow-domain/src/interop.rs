//! External interface contracts (§6): seams the pipeline calls out through
//! but does not implement. Production wiring of these traits (a real
//! travel-time model, a real miniSEED decoder) lives outside this
//! workspace; only test doubles live here.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Predicts P-wave arrival time for a source/receiver pair. The planner
/// stage (§4.6) uses this to anchor each segment's request window; this
/// crate ships no production implementation, only the contract.
pub trait TravelTimeTable: Send + Sync {
    /// `source_depth_km` and the great-circle `distance_deg` determine the
    /// travel time; returns `None` if the model has no coverage for the
    /// given depth/distance combination.
    fn p_arrival(&self, source_depth_km: f64, distance_deg: f64) -> Option<f64>;
}

/// Decodes a dataselect response body into the handful of fields the
/// downloader needs to classify and persist each contained record (§4.8,
/// §6): `unpack` returns one `RecordOutcome` per `NET.STA.LOC.CHA`
/// identifier found in `data`, keyed exactly that way so the caller can
/// match planned rows to records without re-parsing anything itself.
pub trait MiniseedUnpacker: Send + Sync {
    /// Returns `Err` only when `data` isn't parseable as a mini-binary
    /// container at all (mapped by callers to `MSEED_ERR_CODE` for every
    /// row in the group). A record-level problem inside an otherwise
    /// valid container is expressed via `RecordOutcome::error`, not `Err`.
    fn unpack(
        &self,
        data: &[u8],
        request_start: DateTime<Utc>,
        request_end: DateTime<Utc>,
    ) -> Result<HashMap<String, RecordOutcome>, MiniseedError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    /// The decoder rejected this specific record (maps to `MSEED_ERR_CODE`).
    pub error: bool,
    pub data: Vec<u8>,
    pub sample_rate: f64,
    /// Largest gap between consecutive records, in samples; `0.0` if the
    /// record set is contiguous.
    pub maxgap_numsamples: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// `true` when the record extends outside `[request_start, request_end]`.
    pub out_of_requested_range: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MiniseedError {
    #[error("not a miniSEED container")]
    NotMiniseed,
    #[error("empty response body")]
    Empty,
}

/// A constant-velocity stand-in for `TravelTimeTable`, useful for tests and
/// for exercising the planner stage before a real model is wired in.
pub struct ConstantVelocityTable {
    pub km_per_sec: f64,
}

impl TravelTimeTable for ConstantVelocityTable {
    fn p_arrival(&self, source_depth_km: f64, distance_deg: f64) -> Option<f64> {
        const DEG_TO_KM: f64 = 111.195;
        let surface_km = distance_deg * DEG_TO_KM;
        let straight_line_km = (surface_km.powi(2) + source_depth_km.powi(2)).sqrt();
        Some(straight_line_km / self.km_per_sec)
    }
}

/// A fake `MiniseedUnpacker` for tests: treats the body as newline-joined
/// `NET.STA.LOC.CHA` identifiers (one contiguous, in-range record each),
/// so stage tests can assert on matching/classification without a real
/// decoder.
#[derive(Default)]
pub struct FakeMiniseedUnpacker;

impl MiniseedUnpacker for FakeMiniseedUnpacker {
    fn unpack(
        &self,
        data: &[u8],
        request_start: DateTime<Utc>,
        request_end: DateTime<Utc>,
    ) -> Result<HashMap<String, RecordOutcome>, MiniseedError> {
        if data.is_empty() {
            return Err(MiniseedError::Empty);
        }
        let text = std::str::from_utf8(data).map_err(|_| MiniseedError::NotMiniseed)?;
        let mut out = HashMap::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            out.insert(
                line.trim().to_string(),
                RecordOutcome {
                    error: false,
                    data: line.as_bytes().to_vec(),
                    sample_rate: 100.0,
                    maxgap_numsamples: 0.0,
                    start_time: request_start,
                    end_time: request_end,
                    out_of_requested_range: false,
                },
            );
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn constant_velocity_table_scales_with_distance() {
        let table = ConstantVelocityTable { km_per_sec: 8.0 };
        let near = table.p_arrival(10.0, 1.0).unwrap();
        let far = table.p_arrival(10.0, 10.0).unwrap();
        assert!(far > near);
    }

    #[test]
    fn fake_unpacker_rejects_empty_buffers() {
        let unpacker = FakeMiniseedUnpacker;
        let t = Utc.timestamp_opt(0, 0).unwrap();
        assert_eq!(unpacker.unpack(&[], t, t).unwrap_err(), MiniseedError::Empty);
    }

    #[test]
    fn fake_unpacker_keys_records_by_identifier_line() {
        let unpacker = FakeMiniseedUnpacker;
        let t0 = Utc.timestamp_opt(0, 0).unwrap();
        let t1 = Utc.timestamp_opt(60, 0).unwrap();
        let records = unpacker.unpack(b"NET.STA.LOC.CHA\n", t0, t1).unwrap();
        assert!(records.contains_key("NET.STA.LOC.CHA"));
        assert_eq!(records["NET.STA.LOC.CHA"].start_time, t0);
    }
}
