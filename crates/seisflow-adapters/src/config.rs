//! `RunConfig` (SPEC_FULL.md §2 ambient stack): the already-constructed
//! description of one download run. Parsing this from a CLI or a YAML
//! file is the explicitly out-of-scope front-end's job; this crate only
//! consumes the struct and renders it back to YAML for the `Download.config`
//! column.

use chrono::{DateTime, Utc};
use seisflow_policies::RadiusSchedule;
use serde::{Deserialize, Serialize};

/// Mirrors `seisflow_providers::routing::RoutingMode`, kept as its own
/// type here since the provider's isn't `Serialize` (it doesn't need to
/// persist; a `RunConfig` does).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RoutingConfig {
    Explicit { base_url: String },
    Iris,
    Eida { routing_url: String },
}

impl RoutingConfig {
    pub fn to_mode(&self) -> seisflow_providers::RoutingMode {
        use seisflow_providers::RoutingMode;
        match self {
            RoutingConfig::Explicit { base_url } => RoutingMode::Explicit(base_url.clone()),
            RoutingConfig::Iris => RoutingMode::Iris,
            RoutingConfig::Eida { routing_url } => RoutingMode::Eida { routing_url: routing_url.clone() },
        }
    }
}

/// One pipeline run's full configuration (§2, §4.1-4.8 parameters).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub events_webservice_url: String,
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

    pub routing: RoutingConfig,
    /// FDSN channel filter, e.g. `"*"` or `"HH?,BH?,!HHZ"`; split per
    /// field with `,` the same way `WildcardFilter::parse` expects.
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub min_sample_rate: Option<f64>,

    pub radius_schedule: RadiusSchedule,
    pub pre_arrival_minutes: i64,
    pub post_arrival_minutes: i64,
    /// Raw `RetryMask` bits (§4.7); kept as `u8` here rather than the
    /// domain newtype so `RunConfig` stays a plain-data, serde-friendly
    /// struct with no crate-specific `Serialize` impl to maintain.
    pub retry_mask: u8,

    pub max_concurrent_requests: usize,
    pub http_timeout_secs: u64,
    /// `0` disables the memory watchdog (§4.2).
    pub memory_sample_every: usize,
    pub memory_threshold_fraction: f32,

    /// Flush boundary for the downloader's streaming upserter (§4.1, §4.8).
    pub segment_flush_batch_size: usize,
}

impl RunConfig {
    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(self).expect("RunConfig always serializes")
    }

    /// Stable hash of the canonicalized config (§3's `Download.config_hash`):
    /// two runs with byte-identical configuration hash identically
    /// regardless of struct field order.
    pub fn config_hash(&self) -> String {
        let value = serde_json::to_value(self).expect("RunConfig always serializes to JSON");
        seisflow_core::hashing::hash_value(&value)
    }
}
