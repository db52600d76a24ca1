//! Pipeline event kinds and the `PipelineEvent` envelope.
//!
//! The run's trail through its stages is append-only, the same way the
//! teacher's flow engine logs step transitions: each event carries enough to
//! reconstruct `Download.log` without replaying any state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEventKind {
    /// A stage began; `stage` is its `Stage::NAME`.
    StageStarted { stage: &'static str },
    /// A stage finished without a terminal error. `warnings` is the count of
    /// recoverable conditions it raised.
    StageFinished { stage: &'static str, warnings: u32 },
    /// A stage raised a terminal error (§7); the run stops after this event.
    StageFailed { stage: &'static str, error: String },
    /// The run reached its last stage successfully.
    PipelineCompleted { total_warnings: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub seq: u64,
    pub run_id: Uuid,
    pub kind: PipelineEventKind,
    pub ts: DateTime<Utc>,
}
