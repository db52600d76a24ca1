//! seisflow-domain: persistent entities and domain-level contracts for the
//! waveform download orchestrator.
//!
//! This crate knows nothing about HTTP, SQL, or concurrency — it only
//! describes the shapes in play (§3 of the specification) and the small
//! set of pure functions (URL rewriting, wildcard translation, response
//! codes) that the rest of the workspace shares.

pub mod codes;
pub mod entities;
pub mod error;
pub mod interop;
pub mod url;
pub mod wildcard;

pub use codes::{code_in_mask, RetryMask, MSEED_ERR_CODE, TIMESPAN_ERR, TIMESPAN_WARN, URL_ERR_CODE};
pub use entities::{Channel, DataCenter, Download, Event, Segment, Station, WebService, WebServiceType};
pub use error::DomainError;
