//! Bounded-concurrency async URL fetcher (§4.2).
//!
//! Grounded in the same `futures::stream::iter(...).buffer_unordered(n)`
//! shape used by `other_examples`' feed-fetcher, generalized from GET-only
//! RSS fetches to the GET/POST mix the FDSN stages need and fitted with
//! the memory watchdog spec.md calls for.

use std::time::Duration;

use futures::stream::StreamExt;
use thiserror::Error;

/// One request to issue. `Tag` is opaque to the fetcher; it is echoed back
/// on the matching `FetchOutcome` so callers can correlate out-of-order
/// results (§5 "Ordering").
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub url: String,
    pub method: HttpMethod,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decode {
    None,
    Utf8,
}

#[derive(Debug, Clone)]
pub enum FetchBody {
    Bytes(Vec<u8>),
    Text(String),
}

impl FetchBody {
    pub fn is_empty(&self) -> bool {
        match self {
            FetchBody::Bytes(b) => b.is_empty(),
            FetchBody::Text(t) => t.is_empty(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FetchBody::Bytes(b) => b,
            FetchBody::Text(t) => t.as_bytes(),
        }
    }
}

/// Transport-level outcome distinguished per §4.2: network/timeout and
/// decode failures are ours; HTTP 4xx/5xx are only errors when the caller
/// asked for that (`treat_error_status_as_errors`).
#[derive(Debug, Error, Clone)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("http client error: {0}")]
    ClientError(u16),
    #[error("http server error: {0}")]
    ServerError(u16),
    #[error("response body was not valid utf-8")]
    Decode,
}

/// One result: always carries the echoed `url` for correlation, even on
/// failure, plus whatever HTTP status was observed (if a response came
/// back at all).
#[derive(Debug, Clone)]
pub struct FetchOutcome<Tag> {
    pub tag: Tag,
    pub url: String,
    pub status: Option<u16>,
    pub body: Option<FetchBody>,
    pub error: Option<FetchError>,
}

#[derive(Debug, Clone)]
pub struct FetchParams {
    pub max_concurrent: usize,
    pub timeout: Duration,
    pub decode: Decode,
    pub treat_error_status_as_errors: bool,
    /// Sample memory every N emitted results; `0` disables the watchdog.
    pub memory_sample_every: usize,
    pub memory_threshold_fraction: f32,
}

impl Default for FetchParams {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            timeout: Duration::from_secs(30),
            decode: Decode::Utf8,
            treat_error_status_as_errors: true,
            memory_sample_every: 0,
            memory_threshold_fraction: 0.9,
        }
    }
}

/// Samples the fraction of system memory in use. Abstracted so tests can
/// force a watchdog trip deterministically without actually exhausting
/// memory.
pub trait MemorySampler: Send {
    fn sample_fraction(&mut self) -> f32;
}

/// Production sampler backed by `sysinfo`.
pub struct SysinfoMemorySampler {
    sys: sysinfo::System,
}

impl SysinfoMemorySampler {
    pub fn new() -> Self {
        let mut sys = sysinfo::System::new();
        sys.refresh_memory();
        Self { sys }
    }
}

impl Default for SysinfoMemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySampler for SysinfoMemorySampler {
    fn sample_fraction(&mut self) -> f32 {
        self.sys.refresh_memory();
        let total = self.sys.total_memory().max(1);
        self.sys.used_memory() as f32 / total as f32
    }
}

#[derive(Debug, Error, Clone)]
#[error("memory watchdog tripped: {fraction:.3} exceeds threshold {threshold:.3}")]
pub struct MemoryPressure {
    pub fraction: f32,
    pub threshold: f32,
}

/// Issues every request in `requests` through a bounded worker pool,
/// returning results in completion order (§5 "unordered"). Stops early
/// and returns `Err` if the memory watchdog trips; outstanding requests
/// are dropped (best-effort cancellation, §4.2).
pub async fn fetch_all<Tag: Send + 'static>(
    client: &reqwest::Client,
    requests: Vec<(Tag, RequestSpec)>,
    params: &FetchParams,
    sampler: &mut dyn MemorySampler,
) -> Result<Vec<FetchOutcome<Tag>>, MemoryPressure> {
    let decode = params.decode;
    let treat_errors = params.treat_error_status_as_errors;
    let timeout = params.timeout;

    let stream = futures::stream::iter(requests.into_iter().map(|(tag, spec)| {
        let client = client.clone();
        async move {
            let (status, body, error) = execute_one(&client, &spec, timeout, decode, treat_errors).await;
            FetchOutcome { tag, url: spec.url, status, body, error }
        }
    }))
    .buffer_unordered(params.max_concurrent.max(1));

    futures::pin_mut!(stream);
    let mut results = Vec::new();
    let mut since_sample = 0usize;

    while let Some(outcome) = stream.next().await {
        results.push(outcome);
        since_sample += 1;
        if params.memory_sample_every > 0 && since_sample >= params.memory_sample_every {
            since_sample = 0;
            let fraction = sampler.sample_fraction();
            if fraction > params.memory_threshold_fraction {
                log::error!(
                    target: "seisflow_providers::fetcher",
                    "memory watchdog tripped at {fraction:.3} (threshold {:.3}), abandoning {} in-flight requests",
                    params.memory_threshold_fraction,
                    "remaining"
                );
                return Err(MemoryPressure { fraction, threshold: params.memory_threshold_fraction });
            }
        }
    }

    Ok(results)
}

async fn execute_one(
    client: &reqwest::Client,
    spec: &RequestSpec,
    timeout: Duration,
    decode: Decode,
    treat_errors: bool,
) -> (Option<u16>, Option<FetchBody>, Option<FetchError>) {
    let builder = match spec.method {
        HttpMethod::Get => client.get(&spec.url),
        HttpMethod::Post => {
            let b = client.post(&spec.url);
            match &spec.body {
                Some(body) => b.body(body.clone()),
                None => b,
            }
        }
    };

    let response = match tokio::time::timeout(timeout, builder.send()).await {
        Err(_) => return (None, None, Some(FetchError::Timeout)),
        Ok(Err(e)) => return (None, None, Some(FetchError::Network(e.to_string()))),
        Ok(Ok(r)) => r,
    };

    let status = response.status();
    let status_code = status.as_u16();

    if treat_errors && status.is_client_error() {
        return (Some(status_code), None, Some(FetchError::ClientError(status_code)));
    }
    if treat_errors && status.is_server_error() {
        return (Some(status_code), None, Some(FetchError::ServerError(status_code)));
    }

    let bytes = match response.bytes().await {
        Ok(b) => b,
        Err(e) => return (Some(status_code), None, Some(FetchError::Network(e.to_string()))),
    };

    if !treat_errors && (status.is_client_error() || status.is_server_error()) {
        // Caller wants the body even for error statuses (used by the
        // downloader stage, which classifies per-group HTTP status
        // itself rather than having the fetcher reject it).
    }

    let body = match decode {
        Decode::None => FetchBody::Bytes(bytes.to_vec()),
        Decode::Utf8 => match String::from_utf8(bytes.to_vec()) {
            Ok(s) => FetchBody::Text(s),
            Err(_) => return (Some(status_code), None, Some(FetchError::Decode)),
        },
    };

    (Some(status_code), Some(body), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedSampler(f32);
    impl MemorySampler for FixedSampler {
        fn sample_fraction(&mut self) -> f32 {
            self.0
        }
    }

    #[tokio::test]
    async fn fetches_all_and_preserves_tag_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/a")).respond_with(ResponseTemplate::new(200).set_body_string("A")).mount(&server).await;
        Mock::given(method("GET")).and(path("/b")).respond_with(ResponseTemplate::new(200).set_body_string("B")).mount(&server).await;

        let client = reqwest::Client::new();
        let requests = vec![
            ("tag-a", RequestSpec { url: format!("{}/a", server.uri()), method: HttpMethod::Get, body: None }),
            ("tag-b", RequestSpec { url: format!("{}/b", server.uri()), method: HttpMethod::Get, body: None }),
        ];
        let mut sampler = FixedSampler(0.0);
        let results = fetch_all(&client, requests, &FetchParams::default(), &mut sampler).await.unwrap();
        assert_eq!(results.len(), 2);
        let tags: Vec<_> = results.iter().map(|r| r.tag).collect();
        assert!(tags.contains(&"tag-a"));
        assert!(tags.contains(&"tag-b"));
    }

    #[tokio::test]
    async fn server_error_is_classified_distinctly_from_client_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/500")).respond_with(ResponseTemplate::new(500)).mount(&server).await;
        Mock::given(method("GET")).and(path("/404")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

        let client = reqwest::Client::new();
        let requests = vec![
            (1u8, RequestSpec { url: format!("{}/500", server.uri()), method: HttpMethod::Get, body: None }),
            (2u8, RequestSpec { url: format!("{}/404", server.uri()), method: HttpMethod::Get, body: None }),
        ];
        let mut sampler = FixedSampler(0.0);
        let results = fetch_all(&client, requests, &FetchParams::default(), &mut sampler).await.unwrap();
        for r in results {
            match r.tag {
                1 => assert!(matches!(r.error, Some(FetchError::ServerError(500)))),
                2 => assert!(matches!(r.error, Some(FetchError::ClientError(404)))),
                _ => unreachable!(),
            }
        }
    }

    #[tokio::test]
    async fn memory_watchdog_trips_and_abandons_the_rest() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(200).set_body_string("ok")).mount(&server).await;

        let client = reqwest::Client::new();
        let requests: Vec<_> = (0..5)
            .map(|i| (i, RequestSpec { url: format!("{}/{}", server.uri(), i), method: HttpMethod::Get, body: None }))
            .collect();
        let params = FetchParams { max_concurrent: 1, memory_sample_every: 1, memory_threshold_fraction: 0.5, ..FetchParams::default() };
        let mut sampler = FixedSampler(0.99);
        let err = fetch_all(&client, requests, &params, &mut sampler).await.unwrap_err();
        assert!(err.fraction > err.threshold);
    }
}
