//! Orchestrator-wide constants.

/// Recorded on every `Download` row (§3) as `program_version`. Bump when a
/// change to stage semantics would make two runs' output incomparable.
pub const PIPELINE_VERSION: &str = "1.0";
