//! Waveform downloader (§4.8): groups planned segments into dataselect
//! POST requests, falls back to per-segment singletons on HTTP 413, and
//! classifies every row against a `MiniseedUnpacker`.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use seisflow_domain::codes::{MSEED_ERR_CODE, TIMESPAN_ERR, TIMESPAN_WARN, URL_ERR_CODE};
use seisflow_domain::interop::{MiniseedUnpacker, RecordOutcome};

/// One planned row to download. `row_index` is the caller's own index into
/// its planned-segment vector; results are correlated back through it
/// rather than through the (net, sta, loc, cha, start, end) tuple, since
/// two rows can legitimately share that tuple across retries.
#[derive(Debug, Clone)]
pub struct DownloadRow {
    pub row_index: usize,
    pub datacenter_id: i64,
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub request_start: DateTime<Utc>,
    pub request_end: DateTime<Utc>,
}

/// Classification result for one row (§4.8's decision table), ready to be
/// written onto a `Segment`.
#[derive(Debug, Clone)]
pub struct RowOutcome {
    pub row_index: usize,
    pub download_code: Option<i32>,
    pub data: Vec<u8>,
    pub sample_rate: Option<f64>,
    pub maxgap_numsamples: Option<f64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl RowOutcome {
    fn no_data(row_index: usize, download_code: Option<i32>) -> Self {
        Self { row_index, download_code, data: Vec::new(), sample_rate: None, maxgap_numsamples: None, start_time: None, end_time: None }
    }
}

pub struct DownloaderParams {
    pub timeout: Duration,
}

/// §4.8's "aggregates a matrix (data_center_host × response_code → count)"
/// statistic, keyed by the dataselect URL's host and each row's
/// `download_code` (`None` for a row whose record was simply missing from
/// the response). `sum()` over every entry equals the number of rows
/// `download_all` classified, satisfying §8 invariant 2.
#[derive(Debug, Clone, Default)]
pub struct DownloadStats {
    counts: HashMap<(String, Option<i32>), usize>,
}

impl DownloadStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, host: &str, code: Option<i32>) {
        *self.counts.entry((host.to_string(), code)).or_insert(0) += 1;
    }

    fn record_all(&mut self, host: &str, outcomes: &[RowOutcome]) {
        for outcome in outcomes {
            self.record(host, outcome.download_code);
        }
    }

    pub fn get(&self, host: &str, code: Option<i32>) -> usize {
        self.counts.get(&(host.to_string(), code)).copied().unwrap_or(0)
    }

    pub fn sum(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<i32>, usize)> {
        self.counts.iter().map(|((host, code), count)| (host.as_str(), *code, *count))
    }
}

/// Extracts the host from a dataselect URL for use as the stats matrix's
/// row key; falls back to the whole URL if it doesn't parse (so a
/// malformed URL still gets counted somewhere rather than silently lost).
fn host_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| url.to_string())
}

/// A resolved group of rows sharing one `(datacenter_id, request_start,
/// request_end)` key, with the dataselect URL to POST them to.
struct Group {
    dataselect_url: String,
    rows: Vec<DownloadRow>,
}

/// Issues one dataselect request per `(datacenter_id, request_start,
/// request_end)` group, falls any 413 back to per-row singleton requests,
/// and classifies every response against `unpacker`. `dataselect_urls`
/// maps each row's `datacenter_id` to the URL to POST it against. Returns
/// the classified rows alongside the §4.8 per-(host, code) stats matrix.
pub async fn download_all(
    client: &reqwest::Client,
    rows: Vec<DownloadRow>,
    dataselect_urls: &HashMap<i64, String>,
    unpacker: &dyn MiniseedUnpacker,
    params: &DownloaderParams,
) -> (Vec<RowOutcome>, DownloadStats) {
    let groups = group_rows(rows, dataselect_urls);
    let mut outcomes = Vec::new();
    let mut stats = DownloadStats::new();

    for group in groups {
        let host = host_of(&group.dataselect_url);
        let group_outcomes = fetch_group(client, &group, unpacker, params).await;
        stats.record_all(&host, &group_outcomes);
        outcomes.extend(group_outcomes);
    }

    (outcomes, stats)
}

fn group_rows(rows: Vec<DownloadRow>, dataselect_urls: &HashMap<i64, String>) -> Vec<Group> {
    let mut by_key: HashMap<(i64, DateTime<Utc>, DateTime<Utc>), Vec<DownloadRow>> = HashMap::new();
    for row in rows {
        let key = (row.datacenter_id, row.request_start, row.request_end);
        by_key.entry(key).or_default().push(row);
    }
    by_key
        .into_iter()
        .filter_map(|((dc_id, _, _), rows)| {
            dataselect_urls.get(&dc_id).map(|url| Group { dataselect_url: url.clone(), rows })
        })
        .collect()
}

fn request_body(rows: &[DownloadRow]) -> String {
    rows.iter()
        .map(|r| {
            let loc = if r.location.is_empty() { "--" } else { &r.location };
            format!("{} {} {} {} {} {}", r.network, r.station, loc, r.channel, r.request_start.to_rfc3339(), r.request_end.to_rfc3339())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn record_key(row: &DownloadRow) -> String {
    let loc = if row.location.is_empty() { "--" } else { &row.location };
    format!("{}.{}.{}.{}", row.network, row.station, loc, row.channel)
}

async fn fetch_group(
    client: &reqwest::Client,
    group: &Group,
    unpacker: &dyn MiniseedUnpacker,
    params: &DownloaderParams,
) -> Vec<RowOutcome> {
    let body = request_body(&group.rows);
    let response = tokio::time::timeout(params.timeout, client.post(&group.dataselect_url).body(body).send()).await;

    let response = match response {
        Err(_) | Ok(Err(_)) => {
            return group.rows.iter().map(|r| RowOutcome::no_data(r.row_index, Some(URL_ERR_CODE))).collect();
        }
        Ok(Ok(r)) => r,
    };

    let status = response.status().as_u16();

    if status == 413 && group.rows.len() > 1 {
        let mut outcomes = Vec::new();
        for row in &group.rows {
            let singleton = Group { dataselect_url: group.dataselect_url.clone(), rows: vec![row.clone()] };
            outcomes.extend(Box::pin(fetch_group(client, &singleton, unpacker, params)).await);
        }
        return outcomes;
    }

    if status >= 400 {
        return group.rows.iter().map(|r| RowOutcome::no_data(r.row_index, Some(status as i32))).collect();
    }

    let bytes = match response.bytes().await {
        Ok(b) => b,
        Err(_) => return group.rows.iter().map(|r| RowOutcome::no_data(r.row_index, Some(URL_ERR_CODE))).collect(),
    };

    if bytes.is_empty() {
        return group.rows.iter().map(|r| RowOutcome::no_data(r.row_index, Some(status as i32))).collect();
    }

    let (earliest_start, latest_end) = window_bounds(&group.rows);
    let records = match unpacker.unpack(&bytes, earliest_start, latest_end) {
        Ok(records) => records,
        Err(_) => return group.rows.iter().map(|r| RowOutcome::no_data(r.row_index, Some(MSEED_ERR_CODE))).collect(),
    };

    group.rows.iter().map(|row| classify_row(row, status, &records)).collect()
}

fn window_bounds(rows: &[DownloadRow]) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = rows.iter().map(|r| r.request_start).min().expect("group is non-empty");
    let end = rows.iter().map(|r| r.request_end).max().expect("group is non-empty");
    (start, end)
}

/// Applies §4.8's per-record decision table: missing record -> no data,
/// no error code recorded; decoder-rejected record -> `MSEED_ERR_CODE`;
/// out-of-range record with data -> `TIMESPAN_WARN` (kept); out-of-range
/// record with no data -> `TIMESPAN_ERR`; otherwise the HTTP status the
/// group came back with.
fn classify_row(row: &DownloadRow, status: u16, records: &HashMap<String, RecordOutcome>) -> RowOutcome {
    let Some(record) = records.get(&record_key(row)) else {
        return RowOutcome::no_data(row.row_index, None);
    };

    if record.error {
        return RowOutcome::no_data(row.row_index, Some(MSEED_ERR_CODE));
    }

    if record.out_of_requested_range {
        let code = if record.data.is_empty() { TIMESPAN_ERR } else { TIMESPAN_WARN };
        return RowOutcome {
            row_index: row.row_index,
            download_code: Some(code),
            data: record.data.clone(),
            sample_rate: Some(record.sample_rate),
            maxgap_numsamples: Some(record.maxgap_numsamples),
            start_time: Some(record.start_time),
            end_time: Some(record.end_time),
        };
    }

    RowOutcome {
        row_index: row.row_index,
        download_code: Some(status as i32),
        data: record.data.clone(),
        sample_rate: Some(record.sample_rate),
        maxgap_numsamples: Some(record.maxgap_numsamples),
        start_time: Some(record.start_time),
        end_time: Some(record.end_time),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seisflow_domain::interop::{FakeMiniseedUnpacker, MiniseedError};
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn row(row_index: usize, dc_id: i64, station: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> DownloadRow {
        DownloadRow {
            row_index,
            datacenter_id: dc_id,
            network: "NET".into(),
            station: station.into(),
            location: "".into(),
            channel: "HHZ".into(),
            request_start: start,
            request_end: end,
        }
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (Utc::now() - chrono::Duration::hours(1), Utc::now())
    }

    #[tokio::test]
    async fn transport_error_marks_every_row_in_the_group_with_url_err_code() {
        let (start, end) = window();
        let rows = vec![row(0, 1, "AAA", start, end), row(1, 1, "BBB", start, end)];
        let mut urls = HashMap::new();
        urls.insert(1, "http://127.0.0.1:1".to_string());

        let unpacker = FakeMiniseedUnpacker;
        let params = DownloaderParams { timeout: Duration::from_millis(200) };
        let (outcomes, stats) = download_all(&reqwest::Client::new(), rows, &urls, &unpacker, &params).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.download_code == Some(URL_ERR_CODE)));
        assert_eq!(stats.get("127.0.0.1", Some(URL_ERR_CODE)), 2);
        assert_eq!(stats.sum(), 2);
    }

    #[tokio::test]
    async fn http_error_status_is_recorded_on_every_row_in_the_group() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

        let (start, end) = window();
        let rows = vec![row(0, 1, "AAA", start, end)];
        let mut urls = HashMap::new();
        urls.insert(1, server.uri());

        let unpacker = FakeMiniseedUnpacker;
        let params = DownloaderParams { timeout: Duration::from_secs(5) };
        let (outcomes, stats) = download_all(&reqwest::Client::new(), rows, &urls, &unpacker, &params).await;
        assert_eq!(outcomes[0].download_code, Some(500));
        assert_eq!(stats.get(&host_of(&server.uri()), Some(500)), 1);
    }

    #[tokio::test]
    async fn http_413_on_a_multi_row_group_falls_back_to_singleton_requests() {
        let server = MockServer::start().await;

        // A request naming both stations is the original multi-row group;
        // reject it so the downloader must split and retry as singletons.
        Mock::given(method("POST"))
            .and(body_string_contains("AAA"))
            .and(body_string_contains("BBB"))
            .respond_with(ResponseTemplate::new(413))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("AAA"))
            .respond_with(ResponseTemplate::new(200).set_body_string("NET.AAA.--.HHZ\n"))
            .with_priority(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("BBB"))
            .respond_with(ResponseTemplate::new(200).set_body_string("NET.BBB.--.HHZ\n"))
            .with_priority(2)
            .mount(&server)
            .await;

        let (start, end) = window();
        let rows = vec![row(0, 1, "AAA", start, end), row(1, 1, "BBB", start, end)];
        let mut urls = HashMap::new();
        urls.insert(1, server.uri());

        let unpacker = FakeMiniseedUnpacker;
        let params = DownloaderParams { timeout: Duration::from_secs(5) };
        let (outcomes, stats) = download_all(&reqwest::Client::new(), rows, &urls, &unpacker, &params).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.download_code == Some(200)));
        assert_eq!(stats.get(&host_of(&server.uri()), Some(200)), 2);
        assert_eq!(stats.sum(), 2);
    }

    /// §8 seed scenario 2: plan 5 segments against one DC, same window; the
    /// primary POST 413s, the fallback issues 5 singleton POSTs, and the
    /// stats matrix records 5x HTTP 200 against that DC host.
    #[tokio::test]
    async fn five_segment_413_fallback_records_five_http_200_in_the_stats_matrix() {
        let server = MockServer::start().await;
        let stations = ["AAA", "BBB", "CCC", "DDD", "EEE"];

        let mut group_mock = Mock::given(method("POST"));
        for station in stations {
            group_mock = group_mock.and(body_string_contains(station));
        }
        group_mock.respond_with(ResponseTemplate::new(413)).with_priority(1).mount(&server).await;
        for station in stations {
            Mock::given(method("POST"))
                .and(body_string_contains(station))
                .respond_with(ResponseTemplate::new(200).set_body_string(format!("NET.{station}.--.HHZ\n")))
                .with_priority(2)
                .mount(&server)
                .await;
        }

        let (start, end) = window();
        let rows: Vec<DownloadRow> = stations.iter().enumerate().map(|(i, s)| row(i, 1, s, start, end)).collect();
        let mut urls = HashMap::new();
        urls.insert(1, server.uri());

        let unpacker = FakeMiniseedUnpacker;
        let params = DownloaderParams { timeout: Duration::from_secs(5) };
        let (outcomes, stats) = download_all(&reqwest::Client::new(), rows, &urls, &unpacker, &params).await;
        assert_eq!(outcomes.len(), 5);
        assert!(outcomes.iter().all(|o| o.download_code == Some(200)));
        assert_eq!(stats.get(&host_of(&server.uri()), Some(200)), 5);
        assert_eq!(stats.sum(), 5);
    }

    #[test]
    fn out_of_range_record_with_data_is_timespan_warn_not_err() {
        let (start, end) = window();
        let r = row(0, 1, "AAA", start, end);
        let mut records = HashMap::new();
        records.insert(
            record_key(&r),
            RecordOutcome { error: false, data: vec![1, 2, 3], sample_rate: 100.0, maxgap_numsamples: 0.0, start_time: start, end_time: end, out_of_requested_range: true },
        );
        let outcome = classify_row(&r, 200, &records);
        assert_eq!(outcome.download_code, Some(TIMESPAN_WARN));
        assert!(!outcome.data.is_empty());
    }

    #[test]
    fn out_of_range_record_with_no_data_is_timespan_err() {
        let (start, end) = window();
        let r = row(0, 1, "AAA", start, end);
        let mut records = HashMap::new();
        records.insert(
            record_key(&r),
            RecordOutcome { error: false, data: vec![], sample_rate: 100.0, maxgap_numsamples: 0.0, start_time: start, end_time: end, out_of_requested_range: true },
        );
        let outcome = classify_row(&r, 200, &records);
        assert_eq!(outcome.download_code, Some(TIMESPAN_ERR));
    }

    #[test]
    fn decoder_rejected_record_is_mseed_err_code() {
        let (start, end) = window();
        let r = row(0, 1, "AAA", start, end);
        let mut records = HashMap::new();
        records.insert(
            record_key(&r),
            RecordOutcome { error: true, data: vec![], sample_rate: 0.0, maxgap_numsamples: 0.0, start_time: start, end_time: end, out_of_requested_range: false },
        );
        let outcome = classify_row(&r, 200, &records);
        assert_eq!(outcome.download_code, Some(MSEED_ERR_CODE));
    }

    #[test]
    fn missing_record_yields_no_code() {
        let (start, end) = window();
        let r = row(0, 1, "AAA", start, end);
        let outcome = classify_row(&r, 200, &HashMap::new());
        assert_eq!(outcome.download_code, None);
    }

    #[test]
    fn unreadable_container_marks_every_row_mseed_err_code() {
        let unpacker = FakeMiniseedUnpacker;
        let err = unpacker.unpack(&[], Utc::now(), Utc::now()).unwrap_err();
        assert_eq!(err, MiniseedError::Empty);
    }
}
