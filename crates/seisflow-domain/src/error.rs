use thiserror::Error;

/// Domain-level validation and translation errors.
///
/// Kept deliberately small: most failure modes in this system are
/// per-row/per-stage and recoverable (§7 of the spec), so they are modeled
/// as data (`SyncIssue`, `StageWarning` in `seisflow-core`) rather than as
/// variants here. This enum is for things that are wrong regardless of
/// surrounding context.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("malformed FDSN URL: {0}")]
    InvalidFdsnUrl(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::Serialization(e.to_string())
    }
}
