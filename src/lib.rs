//! seisflow: a resumable, at-most-once seismic waveform download
//! orchestrator (events -> routing -> channels -> merge -> planner ->
//! downloader). The crate's own logic lives in `crates/`; this root
//! package is the thin binary shell that wires a `RunConfig` and a
//! connection pool together and drives `seisflow_infra::run`.

pub use seisflow_adapters::{RoutingConfig, RunConfig};
pub use seisflow_infra::{run, DriverError, RunOutcome, PROGRAM_VERSION};
pub use seisflow_providers::DownloadStats;
