//! The neutral pipeline driver (§2, §5): a sequence of `Stage<Ctx>` trait
//! objects run in order, each producing a `StageOutcome` that the engine
//! folds into the run's event trail. `Ctx` is left generic on purpose —
//! this crate has no notion of events, channels, or segments; the concrete
//! `DownloadContext` and its stages live in `seisflow-adapters`, the same
//! split the teacher draws between its neutral engine and its concrete
//! step implementations.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::{OrchestratorError, StageWarning};
use crate::event::{EventStore, PipelineEventKind};

/// One stage of the pipeline. Implementors own their own I/O; the engine
/// only sequences them and records what happened.
#[async_trait]
pub trait Stage<Ctx>: Send + Sync {
    /// Stable name used for logging and for the `PipelineEvent` trail.
    fn name(&self) -> &'static str;

    /// Runs the stage against `ctx`, mutating it in place. A terminal
    /// error (§7) stops the engine; anything recoverable is pushed onto
    /// `StageOutcome::warnings` instead of being returned as `Err`.
    async fn run(&self, ctx: &mut Ctx) -> Result<StageOutcome, OrchestratorError>;
}

/// What a stage reports back to the engine about its own execution.
#[derive(Debug, Clone, Default)]
pub struct StageOutcome {
    pub warnings: Vec<StageWarning>,
    /// `true` when the stage found nothing to hand downstream (§9 "nothing
    /// to do" vs. "hard failure"): the engine stops cleanly (not an error)
    /// rather than running stages that would have no input.
    pub empty: bool,
}

impl StageOutcome {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self { warnings: Vec::new(), empty: true }
    }

    pub fn with_warnings(warnings: Vec<StageWarning>) -> Self {
        Self { warnings, empty: false }
    }
}

/// Outcome of a full pipeline run, accumulated across every stage that ran.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub run_id: Uuid,
    pub total_warnings: u32,
    pub stages_run: Vec<&'static str>,
    /// Set when a stage returned `StageOutcome::empty()`: the name of the
    /// first stage that had nothing to do, per §9's "continue iff the
    /// stage has any non-empty downstream input".
    pub stopped_early_at: Option<&'static str>,
}

/// Runs a fixed sequence of stages against one shared context, appending a
/// `StageStarted`/`StageFinished`/`StageFailed` event per stage to
/// `events` and a final `PipelineCompleted` event on success.
pub struct PipelineEngine<Ctx> {
    stages: Vec<Box<dyn Stage<Ctx>>>,
}

impl<Ctx> PipelineEngine<Ctx> {
    pub fn new(stages: Vec<Box<dyn Stage<Ctx>>>) -> Self {
        Self { stages }
    }

    /// `run_id` is the caller's to pick, rather than minted here: a
    /// `PgEventStore` must `bind` a run to its `Download` row before the
    /// first `StageStarted` event arrives, which means the caller needs
    /// to know the id up front.
    pub async fn run(
        &self,
        ctx: &mut Ctx,
        events: &mut dyn EventStore,
        run_id: Uuid,
    ) -> Result<RunReport, OrchestratorError> {
        let mut report = RunReport { run_id, ..Default::default() };

        for stage in &self.stages {
            let name = stage.name();
            events.append_kind(run_id, PipelineEventKind::StageStarted { stage: name });
            log::info!(target: "seisflow_core::engine", "stage `{name}` started (run {run_id})");

            match stage.run(ctx).await {
                Ok(outcome) if outcome.empty => {
                    events.append_kind(
                        run_id,
                        PipelineEventKind::StageFinished { stage: name, warnings: 0 },
                    );
                    log::info!(target: "seisflow_core::engine", "stage `{name}` had nothing to do; stopping run {run_id}");
                    report.stages_run.push(name);
                    report.stopped_early_at = Some(name);
                    return Ok(report);
                }
                Ok(outcome) => {
                    let warnings = outcome.warnings.len() as u32;
                    for w in &outcome.warnings {
                        log::warn!(target: "seisflow_core::engine", "stage `{name}`: {}", w.message);
                    }
                    events.append_kind(
                        run_id,
                        PipelineEventKind::StageFinished { stage: name, warnings },
                    );
                    report.total_warnings += warnings;
                    report.stages_run.push(name);
                }
                Err(err) => {
                    events.append_kind(
                        run_id,
                        PipelineEventKind::StageFailed { stage: name, error: err.to_string() },
                    );
                    log::error!(target: "seisflow_core::engine", "stage `{name}` failed: {err}");
                    return Err(err);
                }
            }
        }

        events.append_kind(
            run_id,
            PipelineEventKind::PipelineCompleted { total_warnings: report.total_warnings },
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::InMemoryEventStore;

    #[derive(Default)]
    struct Counter(u32);

    struct Increment;
    #[async_trait]
    impl Stage<Counter> for Increment {
        fn name(&self) -> &'static str {
            "increment"
        }
        async fn run(&self, ctx: &mut Counter) -> Result<StageOutcome, OrchestratorError> {
            ctx.0 += 1;
            Ok(StageOutcome::ok())
        }
    }

    struct StopHere;
    #[async_trait]
    impl Stage<Counter> for StopHere {
        fn name(&self) -> &'static str {
            "stop_here"
        }
        async fn run(&self, _ctx: &mut Counter) -> Result<StageOutcome, OrchestratorError> {
            Ok(StageOutcome::empty())
        }
    }

    struct NeverRuns;
    #[async_trait]
    impl Stage<Counter> for NeverRuns {
        fn name(&self) -> &'static str {
            "never_runs"
        }
        async fn run(&self, ctx: &mut Counter) -> Result<StageOutcome, OrchestratorError> {
            ctx.0 += 100;
            Ok(StageOutcome::ok())
        }
    }

    struct Explode;
    #[async_trait]
    impl Stage<Counter> for Explode {
        fn name(&self) -> &'static str {
            "explode"
        }
        async fn run(&self, _ctx: &mut Counter) -> Result<StageOutcome, OrchestratorError> {
            Err(OrchestratorError::NoEventsReturned)
        }
    }

    #[tokio::test]
    async fn runs_stages_in_order_and_emits_events() {
        let engine = PipelineEngine::new(vec![Box::new(Increment), Box::new(Increment)]);
        let mut ctx = Counter::default();
        let mut store = InMemoryEventStore::new();
        let run_id = Uuid::new_v4();
        let report = engine.run(&mut ctx, &mut store, run_id).await.unwrap();
        assert_eq!(ctx.0, 2);
        assert_eq!(report.stages_run, vec!["increment", "increment"]);
        assert!(report.stopped_early_at.is_none());
        assert_eq!(store.len_for(run_id), 5); // 2x(started+finished) + completed
    }

    #[tokio::test]
    async fn empty_outcome_stops_the_run_without_error() {
        let engine =
            PipelineEngine::new(vec![Box::new(Increment), Box::new(StopHere), Box::new(NeverRuns)]);
        let mut ctx = Counter::default();
        let mut store = InMemoryEventStore::new();
        let report = engine.run(&mut ctx, &mut store, Uuid::new_v4()).await.unwrap();
        assert_eq!(ctx.0, 1, "NeverRuns must not execute after StopHere");
        assert_eq!(report.stopped_early_at, Some("stop_here"));
    }

    #[tokio::test]
    async fn terminal_error_aborts_and_is_returned() {
        let engine = PipelineEngine::new(vec![Box::new(Increment), Box::new(Explode)]);
        let mut ctx = Counter::default();
        let mut store = InMemoryEventStore::new();
        let err = engine.run(&mut ctx, &mut store, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::NoEventsReturned));
        assert_eq!(err.exit_code(), 1);
    }
}
