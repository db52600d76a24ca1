//! Great-circle geometry and station-validity checks used by the
//! event-to-channel merge (§4.6).

use chrono::{DateTime, Duration, Utc};

/// Great-circle angular distance between two points, in degrees
/// (haversine formula; the caller supplies degrees, not radians).
pub fn angular_distance_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) =
        (lat1.to_radians(), lon1.to_radians(), lat2.to_radians(), lon2.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    c.to_degrees()
}

/// `true` iff a station is recording at `event_time`, with the one-day
/// grace period past `end_time` that a P-wave coda can still span (§4.6,
/// §8 boundary case).
pub fn station_covers_event(
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    event_time: DateTime<Utc>,
) -> bool {
    if start_time > event_time {
        return false;
    }
    match end_time {
        None => true,
        Some(end) => end >= event_time + Duration::days(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn distance_between_identical_points_is_zero() {
        assert!(angular_distance_deg(10.0, 20.0, 10.0, 20.0).abs() < 1e-9);
    }

    #[test]
    fn one_degree_of_longitude_at_equator_is_about_one_degree() {
        let d = angular_distance_deg(0.0, 0.0, 0.0, 1.0);
        assert!((d - 1.0).abs() < 1e-6);
    }

    #[test]
    fn open_ended_station_always_covers() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let event = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        assert!(station_covers_event(start, None, event));
    }

    #[test]
    fn boundary_exactly_one_day_before_end_is_included() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2022, 1, 2, 0, 0, 0).unwrap();
        let event = end - Duration::days(1);
        assert!(station_covers_event(start, Some(end), event));
    }

    #[test]
    fn one_second_past_the_boundary_is_excluded() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2022, 1, 2, 0, 0, 0).unwrap();
        let event = end - Duration::days(1) - Duration::seconds(1);
        assert!(!station_covers_event(start, Some(end), event));
    }

    #[test]
    fn event_before_station_start_is_excluded() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let event = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
        assert!(!station_covers_event(start, None, event));
    }
}
