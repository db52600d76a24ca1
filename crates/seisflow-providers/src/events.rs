//! Events stage (§4.3): one FDSN event-text query, recursively bisected
//! on HTTP 413 ("entity too large").

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::parsing::{data_rows, parse_event_row, RawEventRow};

#[derive(Debug, Clone)]
pub struct EventQuery {
    pub webservice_url: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub min_latitude: Option<f64>,
    pub max_latitude: Option<f64>,
    pub min_longitude: Option<f64>,
    pub max_longitude: Option<f64>,
    pub min_depth: Option<f64>,
    pub max_depth: Option<f64>,
    pub min_magnitude: Option<f64>,
    pub max_magnitude: Option<f64>,
}

impl EventQuery {
    fn url_for_window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        let mut params = vec![
            "format=text".to_string(),
            format!("start={}", start.to_rfc3339()),
            format!("end={}", end.to_rfc3339()),
        ];
        if let Some(v) = self.min_latitude {
            params.push(format!("minlatitude={v}"));
        }
        if let Some(v) = self.max_latitude {
            params.push(format!("maxlatitude={v}"));
        }
        if let Some(v) = self.min_longitude {
            params.push(format!("minlongitude={v}"));
        }
        if let Some(v) = self.max_longitude {
            params.push(format!("maxlongitude={v}"));
        }
        if let Some(v) = self.min_depth {
            params.push(format!("mindepth={v}"));
        }
        if let Some(v) = self.max_depth {
            params.push(format!("maxdepth={v}"));
        }
        if let Some(v) = self.min_magnitude {
            params.push(format!("minmagnitude={v}"));
        }
        if let Some(v) = self.max_magnitude {
            params.push(format!("maxmagnitude={v}"));
        }
        let sep = if self.webservice_url.contains('?') { "&" } else { "?" };
        format!("{}{}{}", self.webservice_url, sep, params.join("&"))
    }
}

#[derive(Debug, Error, Clone)]
pub enum EventsError {
    #[error("network error: {0}")]
    Network(String),
    #[error("http error {0}")]
    Http(u16),
    #[error("window below bisection floor still returned 413")]
    BisectionExhausted,
}

/// Aggregated result of a (possibly bisected) events fetch. `sub_range_errors`
/// are recoverable per stage (§7): the caller logs them and keeps whatever
/// sub-ranges succeeded.
#[derive(Debug, Default)]
pub struct EventsFetchResult {
    pub events: Vec<RawEventRow>,
    pub sub_range_errors: Vec<(DateTime<Utc>, DateTime<Utc>, EventsError)>,
}

const BISECTION_FLOOR: chrono::Duration = chrono::Duration::seconds(1);

pub async fn fetch_events(
    client: &reqwest::Client,
    query: &EventQuery,
    timeout: Duration,
) -> EventsFetchResult {
    let mut result = EventsFetchResult::default();
    fetch_window(client, query, query.start, query.end, timeout, &mut result).await;
    result
}

fn fetch_window<'a>(
    client: &'a reqwest::Client,
    query: &'a EventQuery,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    timeout: Duration,
    result: &'a mut EventsFetchResult,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        let url = query.url_for_window(start, end);
        let response = tokio::time::timeout(timeout, client.get(&url).send()).await;

        let response = match response {
            Err(_) => {
                result.sub_range_errors.push((start, end, EventsError::Network("timeout".into())));
                return;
            }
            Ok(Err(e)) => {
                result.sub_range_errors.push((start, end, EventsError::Network(e.to_string())));
                return;
            }
            Ok(Ok(r)) => r,
        };

        if response.status().as_u16() == 413 {
            if end - start <= BISECTION_FLOOR {
                result.sub_range_errors.push((start, end, EventsError::BisectionExhausted));
                return;
            }
            let mid = start + (end - start) / 2;
            fetch_window(client, query, start, mid, timeout, result).await;
            fetch_window(client, query, mid, end, timeout, result).await;
            return;
        }

        if !response.status().is_success() {
            result.sub_range_errors.push((start, end, EventsError::Http(response.status().as_u16())));
            return;
        }

        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => {
                result.sub_range_errors.push((start, end, EventsError::Network(e.to_string())));
                return;
            }
        };

        for fields in data_rows(&text) {
            if let Some(row) = parse_event_row(&fields) {
                result.events.push(row);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn query(url: String) -> EventQuery {
        EventQuery {
            webservice_url: url,
            start: Utc::now() - chrono::Duration::days(1),
            end: Utc::now(),
            min_latitude: None,
            max_latitude: None,
            min_longitude: None,
            max_longitude: None,
            min_depth: None,
            max_depth: None,
            min_magnitude: Some(3.0),
            max_magnitude: None,
        }
    }

    #[tokio::test]
    async fn parses_events_from_a_plain_200_response() {
        let server = MockServer::start().await;
        let body = "#EventID|Time|Lat|Lon|Depth|Author|Cat|Contrib|ContribId|MagType|Mag\nevt1|2022-01-01T00:00:00|0.0|1.0|10.0|a|b|c|d|mw|5.0\n";
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(200).set_body_string(body)).mount(&server).await;

        let client = reqwest::Client::new();
        let result = fetch_events(&client, &query(server.uri()), Duration::from_secs(5)).await;
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].event_id, "evt1");
        assert!(result.sub_range_errors.is_empty());
    }

    #[tokio::test]
    async fn bisects_on_413_and_concatenates_halves() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(413)).up_to_n_times(1).mount(&server).await;
        let body = "evt1|2022-01-01T00:00:00|0.0|1.0|10.0|a|b|c|d|mw|5.0\n";
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(200).set_body_string(body)).mount(&server).await;

        let client = reqwest::Client::new();
        let result = fetch_events(&client, &query(server.uri()), Duration::from_secs(5)).await;
        assert!(result.events.len() >= 1);
    }

    #[tokio::test]
    async fn http_error_is_recorded_as_a_sub_range_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

        let client = reqwest::Client::new();
        let result = fetch_events(&client, &query(server.uri()), Duration::from_secs(5)).await;
        assert!(result.events.is_empty());
        assert_eq!(result.sub_range_errors.len(), 1);
    }
}
