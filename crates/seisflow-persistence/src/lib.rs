//! seisflow-persistence
//!
//! Diesel/Postgres implementation of §3's data model and §4.1's sync
//! contract.
//!
//! Modules:
//! - `schema`: hand-written Diesel tables, matching `migrations/`.
//! - `rows`: per-table row structs and domain-entity conversions.
//! - `sync`: the insert-new/update-existing upsert primitive every
//!   post-routing stage persists its batch through.
//! - `upsert_stream`: a buffered, flush-on-close wrapper around
//!   `sync_segments` for the downloader stage.
//! - `repository`: reads and writes that don't fit the natural-key sync
//!   shape (DB fallback for channels, existing-segment lookups, the
//!   `Download` row's own lifecycle).
//! - `event_store`: a Postgres-backed `seisflow_core::event::EventStore`.
//! - `pg`: connection pooling (Diesel + r2d2).
//! - `migrations`: embedded-migration runner.
//! - `config`: `.env`-based connection configuration.

pub mod config;
pub mod error;
pub mod event_store;
pub mod migrations;
pub mod pg;
pub mod repository;
pub mod rows;
pub mod schema;
pub mod sync;
pub mod upsert_stream;

pub use config::{init_dotenv, DbConfig};
pub use error::{is_retryable, PersistenceError};
pub use event_store::PgEventStore;
pub use pg::{build_dev_pool_from_env, build_pool, ConnectionProvider, PgPool, PoolProvider, PooledConnection};
pub use repository::{
    insert_download, load_channels_matching, load_datacenters, load_existing_segments, update_download_counters, ChannelWithStation,
};
pub use sync::{sync_channels, sync_data_centers, sync_events, sync_segments, sync_stations, sync_web_services, SyncStats};
pub use upsert_stream::SegmentUpserter;
