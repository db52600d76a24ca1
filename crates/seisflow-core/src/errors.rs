//! Orchestrator error taxonomy (§7): terminal errors abort the run and map
//! to a process exit code; recoverable and informational conditions are
//! data (`StageWarning`, see `engine`) rather than variants here.

use thiserror::Error;

/// Conditions that stop the pipeline outright. Each variant corresponds to
/// one of the terminal cases enumerated in §7.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("routing unavailable and no DB fallback for {webservice_url}")]
    RoutingUnavailable { webservice_url: String },

    #[error("no events returned by any configured event webservice")]
    NoEventsReturned,

    #[error("no stations returned by any data center")]
    NoStationsReturned,

    #[error("memory watchdog aborted the run: {0}")]
    MemoryPressure(String),

    #[error("DB sync wrote zero rows for {table}")]
    SyncWroteNothing { table: &'static str },

    #[error("invalid configuration: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    /// Process exit code per §7: 1 for any terminal error here, reserving 2
    /// for invalid input and 3 for unexpected internal failure so the
    /// driver's `main` can distinguish them without re-matching variants.
    pub fn exit_code(&self) -> i32 {
        match self {
            OrchestratorError::InvalidInput(_) => 2,
            OrchestratorError::Internal(_) => 3,
            _ => 1,
        }
    }
}

/// A per-row/per-stage condition that does not stop the pipeline (§7
/// "recoverable" and "informational" cases). Carried on `StageOutcome` and
/// folded into the `Download.warnings`/`errors` counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageWarning {
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Logged at a level below warning; does not increment `Download.warnings`.
    Informational,
    /// Logged as a warning and counted.
    Recoverable,
}

impl StageWarning {
    pub fn recoverable(message: impl Into<String>) -> Self {
        Self { severity: Severity::Recoverable, message: message.into() }
    }

    pub fn informational(message: impl Into<String>) -> Self {
        Self { severity: Severity::Informational, message: message.into() }
    }
}
