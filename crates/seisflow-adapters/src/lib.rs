//! seisflow-adapters: the concrete `DownloadContext` and its six
//! `Stage<DownloadContext>` implementations (§4.3-§4.8), wiring
//! `seisflow-providers` (HTTP), `seisflow-policies` (pure decisions) and
//! `seisflow-persistence` (storage) into the neutral engine from
//! `seisflow-core`.

pub mod config;
pub mod context;
pub mod stages;

pub use config::{RoutingConfig, RunConfig};
pub use context::DownloadContext;
pub use stages::{
    ChannelsStage, DownloaderStage, EventsStage, MergeStage, PlannerStage, RoutingStage,
};
