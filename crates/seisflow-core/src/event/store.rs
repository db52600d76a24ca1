//! Append-only event storage for pipeline runs.
//!
//! Each run (identified by a UUID) accumulates an ordered sequence of
//! `PipelineEvent`s. The store never mutates or removes a past event; a run's
//! `Download.log` is rendered by folding this sequence.

use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

use super::{PipelineEvent, PipelineEventKind};

/// Append-only event log, abstracted so a persistence-backed implementation
/// can replace `InMemoryEventStore` without touching `PipelineEngine`.
pub trait EventStore {
    /// Appends an event derived from `kind`, assigning `seq` and `ts`.
    fn append_kind(&mut self, run_id: Uuid, kind: PipelineEventKind) -> PipelineEvent;

    /// Lists a run's events in ascending `seq` order.
    fn list(&self, run_id: Uuid) -> Vec<PipelineEvent>;
}

/// Volatile, single-threaded `EventStore`. Useful for tests and for driving
/// the engine without the persistence crate.
pub struct InMemoryEventStore {
    pub inner: HashMap<Uuid, Vec<PipelineEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self { inner: HashMap::new() }
    }

    pub fn len_for(&self, run_id: Uuid) -> usize {
        self.inner.get(&run_id).map(|v| v.len()).unwrap_or(0)
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore for InMemoryEventStore {
    fn append_kind(&mut self, run_id: Uuid, kind: PipelineEventKind) -> PipelineEvent {
        let vec = self.inner.entry(run_id).or_default();
        let seq = vec.len() as u64;
        let ev = PipelineEvent { seq, run_id, kind, ts: Utc::now() };
        vec.push(ev.clone());
        ev
    }

    fn list(&self, run_id: Uuid) -> Vec<PipelineEvent> {
        self.inner.get(&run_id).cloned().unwrap_or_default()
    }
}
