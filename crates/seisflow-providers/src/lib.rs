//! seisflow-providers: all outbound HTTP I/O for the download orchestrator
//! (§4.2-§4.5, §4.8). Every network call the pipeline makes — events,
//! routing, channels, dataselect — lives here behind a small, typed
//! surface; the stages in `seisflow-adapters` call into these functions
//! but own no transport code themselves.

pub mod channels;
pub mod dataselect;
pub mod events;
pub mod fetcher;
pub mod parsing;
pub mod routing;

pub use channels::{fetch_channels_for_datacenter, ChannelCandidate, ChannelFilterParams};
pub use dataselect::{download_all, DownloadRow, DownloadStats, DownloaderParams, RowOutcome};
pub use events::{fetch_events, EventQuery, EventsError, EventsFetchResult};
pub use fetcher::{fetch_all, FetchError, FetchOutcome, FetchParams, HttpMethod, MemoryPressure, MemorySampler, RequestSpec, SysinfoMemorySampler};
pub use parsing::{parse_channel_row, parse_event_row, parse_fdsn_time, RawChannelRow, RawEventRow};
pub use routing::{resolve_routing, RoutedDataCenter, RoutingError, RoutingMode, RoutingQuery, RoutingResult};
