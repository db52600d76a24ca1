//! Streaming variant of `sync` (§4.1): accepts segments one at a time,
//! flushing a batch to `sync_segments` either when the buffer fills or on
//! explicit `close`. The downloader stage (§4.8) uses this so memory use
//! stays bounded regardless of how many segments a run touches.

use diesel::pg::PgConnection;
use seisflow_domain::entities::Segment;

use crate::error::PersistenceError;
use crate::sync::{sync_segments, SyncStats};

pub struct SegmentUpserter<'a> {
    conn: &'a mut PgConnection,
    buffer: Vec<Segment>,
    buffer_size: usize,
    stats: SyncStats,
}

impl<'a> SegmentUpserter<'a> {
    pub fn new(conn: &'a mut PgConnection, buffer_size: usize) -> Self {
        Self { conn, buffer: Vec::new(), buffer_size: buffer_size.max(1), stats: SyncStats::default() }
    }

    pub fn push(&mut self, segment: Segment) -> Result<(), PersistenceError> {
        self.buffer.push(segment);
        if self.buffer.len() >= self.buffer_size {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), PersistenceError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.buffer);
        let (stats, _) = sync_segments(self.conn, &batch)?;
        self.stats.inserted += stats.inserted;
        self.stats.updated += stats.updated;
        self.stats.rejected.extend(stats.rejected);
        Ok(())
    }

    /// Flushes whatever remains and returns the aggregate stats for the
    /// whole stream.
    pub fn close(mut self) -> Result<SyncStats, PersistenceError> {
        self.flush()?;
        Ok(self.stats)
    }
}
