//! Download planner decision logic (§4.7): pure functions over in-memory
//! rows. Persistence (loading existing segments, writing planned ones)
//! lives in `seisflow-persistence`/`seisflow-adapters`; this module only
//! decides which candidates survive and what request window they get.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use seisflow_domain::codes::{code_in_mask, RetryMask};

/// One event↔channel candidate coming out of the merge stage (§4.6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentCandidate {
    pub channel_id: i64,
    pub event_id: i64,
    pub datacenter_id: i64,
    pub event_distance_deg: f64,
    pub arrival_time: DateTime<Utc>,
}

/// The subset of an existing `Segment` row the planner needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExistingSegment {
    pub id: i64,
    pub channel_id: i64,
    pub event_id: i64,
    pub request_start: DateTime<Utc>,
    pub request_end: DateTime<Utc>,
    pub download_code: Option<i32>,
}

/// One row the planner decided should be (re)downloaded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedSegment {
    /// `Some` for an update to an existing row, `None` for a fresh insert.
    pub existing_id: Option<i64>,
    pub channel_id: i64,
    pub event_id: i64,
    pub datacenter_id: i64,
    pub event_distance_deg: f64,
    pub arrival_time: DateTime<Utc>,
    pub request_start: DateTime<Utc>,
    pub request_end: DateTime<Utc>,
    /// Set when an existing row's stored bounds differ from the freshly
    /// computed ones (§4.7 step 3): forces a retry regardless of the
    /// retry mask.
    pub time_bounds_changed: bool,
}

/// Rounds to the nearest whole second (§4.7, §8 boundary case), ties
/// rounding away from zero via `chrono::Duration::round`-equivalent
/// manual arithmetic since `chrono` has no built-in "round to second".
pub fn round_to_nearest_second(dt: DateTime<Utc>) -> DateTime<Utc> {
    let nanos = dt.timestamp_subsec_nanos();
    let base = dt - Duration::nanoseconds(nanos as i64);
    if nanos >= 500_000_000 { base + Duration::seconds(1) } else { base }
}

/// Plans which candidates to (re)download. Returns the planned batch plus
/// informational messages (duplicate proximity warnings, §4.7 step 5).
pub fn plan(
    candidates: &[SegmentCandidate],
    existing: &[ExistingSegment],
    retry_mask: RetryMask,
    pre_arrival: Duration,
    post_arrival: Duration,
) -> (Vec<PlannedSegment>, Vec<String>) {
    let mut by_key: HashMap<(i64, i64), ExistingSegment> = HashMap::new();
    for row in existing {
        by_key.insert((row.channel_id, row.event_id), *row);
    }

    let mut planned = Vec::new();
    for c in candidates {
        let request_start = round_to_nearest_second(c.arrival_time - pre_arrival);
        let request_end = round_to_nearest_second(c.arrival_time + post_arrival);

        match by_key.get(&(c.channel_id, c.event_id)) {
            None => {
                planned.push(PlannedSegment {
                    existing_id: None,
                    channel_id: c.channel_id,
                    event_id: c.event_id,
                    datacenter_id: c.datacenter_id,
                    event_distance_deg: c.event_distance_deg,
                    arrival_time: c.arrival_time,
                    request_start,
                    request_end,
                    time_bounds_changed: false,
                });
            }
            Some(row) => {
                let time_bounds_changed =
                    row.request_start != request_start || row.request_end != request_end;
                let code_says_retry = code_in_mask(row.download_code, retry_mask);
                if time_bounds_changed || code_says_retry {
                    planned.push(PlannedSegment {
                        existing_id: Some(row.id),
                        channel_id: c.channel_id,
                        event_id: c.event_id,
                        datacenter_id: c.datacenter_id,
                        event_distance_deg: c.event_distance_deg,
                        arrival_time: c.arrival_time,
                        request_start,
                        request_end,
                        time_bounds_changed,
                    });
                }
            }
        }
    }

    let warnings = duplicate_window_warnings(&planned);
    (planned, warnings)
}

/// §4.7 step 5: different event ids landing on the same
/// `(channel_id, request_start, request_end)` triple — two events whose
/// arrivals at one channel fall within the same rounded second. Kept, but
/// surfaced so the caller can log an informational message.
fn duplicate_window_warnings(planned: &[PlannedSegment]) -> Vec<String> {
    let mut seen: HashMap<(i64, DateTime<Utc>, DateTime<Utc>), i64> = HashMap::new();
    let mut warnings = Vec::new();
    for p in planned {
        let key = (p.channel_id, p.request_start, p.request_end);
        match seen.get(&key) {
            Some(other_event) if *other_event != p.event_id => {
                warnings.push(format!(
                    "duplicate request window: channel {} events {} and {} both map to [{}, {}]",
                    p.channel_id, other_event, p.event_id, p.request_start, p.request_end
                ));
            }
            _ => {
                seen.insert(key, p.event_id);
            }
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn offsets() -> (Duration, Duration) {
        (Duration::minutes(1), Duration::minutes(2))
    }

    #[test]
    fn new_candidate_becomes_an_insert() {
        let c = SegmentCandidate {
            channel_id: 1,
            event_id: 10,
            datacenter_id: 1,
            event_distance_deg: 2.0,
            arrival_time: at(0),
        };
        let (pre, post) = offsets();
        let (planned, warnings) = plan(&[c], &[], RetryMask::NONE, pre, post);
        assert_eq!(planned.len(), 1);
        assert!(planned[0].existing_id.is_none());
        assert!(warnings.is_empty());
    }

    #[test]
    fn existing_row_with_non_retryable_code_and_unchanged_bounds_is_dropped() {
        let c = SegmentCandidate {
            channel_id: 1,
            event_id: 10,
            datacenter_id: 1,
            event_distance_deg: 2.0,
            arrival_time: at(0),
        };
        let (pre, post) = offsets();
        let existing = ExistingSegment {
            id: 99,
            channel_id: 1,
            event_id: 10,
            request_start: round_to_nearest_second(at(0) - pre),
            request_end: round_to_nearest_second(at(0) + post),
            download_code: Some(200),
        };
        let (planned, _) = plan(&[c], &[existing], RetryMask::NONE, pre, post);
        assert!(planned.is_empty(), "nothing to do: code not retryable, bounds unchanged");
    }

    #[test]
    fn existing_row_matching_retry_mask_is_updated() {
        let c = SegmentCandidate {
            channel_id: 1,
            event_id: 10,
            datacenter_id: 1,
            event_distance_deg: 2.0,
            arrival_time: at(0),
        };
        let (pre, post) = offsets();
        let existing = ExistingSegment {
            id: 99,
            channel_id: 1,
            event_id: 10,
            request_start: round_to_nearest_second(at(0) - pre),
            request_end: round_to_nearest_second(at(0) + post),
            download_code: Some(500),
        };
        let mask = RetryMask::NONE.with(RetryMask::SERVER_ERR);
        let (planned, _) = plan(&[c], &[existing], mask, pre, post);
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].existing_id, Some(99));
        assert!(!planned[0].time_bounds_changed);
    }

    #[test]
    fn changed_bounds_force_retry_regardless_of_mask() {
        let c = SegmentCandidate {
            channel_id: 1,
            event_id: 10,
            datacenter_id: 1,
            event_distance_deg: 2.0,
            arrival_time: at(0),
        };
        let (pre, post) = offsets();
        let existing = ExistingSegment {
            id: 99,
            channel_id: 1,
            event_id: 10,
            // stale window, far from the newly-computed one
            request_start: at(-9999),
            request_end: at(-9000),
            download_code: Some(200),
        };
        let (planned, _) = plan(&[c], &[existing], RetryMask::NONE, pre, post);
        assert_eq!(planned.len(), 1);
        assert!(planned[0].time_bounds_changed);
    }

    #[test]
    fn null_download_code_is_treated_as_seg_not_found() {
        let c = SegmentCandidate {
            channel_id: 1,
            event_id: 10,
            datacenter_id: 1,
            event_distance_deg: 2.0,
            arrival_time: at(0),
        };
        let (pre, post) = offsets();
        let existing = ExistingSegment {
            id: 99,
            channel_id: 1,
            event_id: 10,
            request_start: round_to_nearest_second(at(0) - pre),
            request_end: round_to_nearest_second(at(0) + post),
            download_code: None,
        };
        let mask = RetryMask::NONE.with(RetryMask::SEG_NOT_FOUND);
        let (planned, _) = plan(&[c], &[existing], mask, pre, post);
        assert_eq!(planned.len(), 1);
    }

    #[test]
    fn duplicate_arrival_windows_warn_but_both_are_kept() {
        let shared_arrival = at(0);
        let c1 = SegmentCandidate {
            channel_id: 1,
            event_id: 10,
            datacenter_id: 1,
            event_distance_deg: 2.0,
            arrival_time: shared_arrival,
        };
        let c2 = SegmentCandidate {
            channel_id: 1,
            event_id: 11,
            datacenter_id: 1,
            event_distance_deg: 2.1,
            arrival_time: shared_arrival,
        };
        let (pre, post) = offsets();
        let (planned, warnings) = plan(&[c1, c2], &[], RetryMask::NONE, pre, post);
        assert_eq!(planned.len(), 2);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn rounding_ties_go_up() {
        let half_second_late = at(0) + Duration::milliseconds(500);
        let rounded = round_to_nearest_second(half_second_late);
        assert_eq!(rounded, at(1));
    }
}
