//! Workflow step engine.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde_json::Value;
use tally_core::{
    ErrorId, PhaseCompletion, PhaseRecord, PhaseStatus, WorkflowError, WorkflowResult, WorkflowRun,
};
use tokio_util::sync::CancellationToken;

use super::TRACING_TARGET;
use super::config::EngineConfig;
use super::phase::{PhaseContext, PhaseDefinition, PhaseOutcome};
use super::progress::{LogProgress, Progress, ProgressSink};
use super::workflow::{SKIPPED_BY_CONFIGURATION, Workflow};

/// Terminal result of one attempt.
enum Attempt {
    Succeeded(Option<Value>),
    Skipped(String),
    Failed(Option<WorkflowError>),
    Cancelled,
}

/// Terminal result of a phase, after retries.
struct Execution {
    attempt: Attempt,
    attempts: u32,
    errors: Vec<WorkflowError>,
}

/// Executes workflows phase by phase on the calling task.
///
/// Phases run strictly in order. Failures are caught at the phase boundary,
/// panics included, and turned into recorded [`WorkflowError`]s; the finalizer
/// runs exactly once per run whatever happened before it.
pub struct Engine {
    config: EngineConfig,
    progress: Arc<dyn ProgressSink>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    /// Creates an engine that logs progress.
    pub fn new(config: EngineConfig) -> Self {
        tracing::debug!(
            target: TRACING_TARGET,
            max_retries = config.max_retries,
            retry_delay_ms = config.retry_delay.as_millis() as u64,
            phase_timeout_secs = config.phase_timeout.map(|t| t.as_secs()),
            "Workflow engine initialized"
        );

        Self {
            config,
            progress: Arc::new(LogProgress),
        }
    }

    /// Replaces the progress sink.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs `workflow` to completion and returns the terminal run.
    ///
    /// Never fails: every failure ends up in the run's error tracker.
    pub async fn run<S: Send>(
        &self,
        workflow: &Workflow<S>,
        state: &mut S,
        cancel: &CancellationToken,
    ) -> WorkflowRun {
        let phases = workflow.phases();
        let mut run = WorkflowRun::start(
            phases
                .iter()
                .map(|phase| PhaseRecord::pending(phase.name(), phase.is_fatal())),
        );

        let pre_skipped = workflow.pre_skipped();
        for (index, skipped) in pre_skipped.iter().enumerate() {
            if *skipped {
                run.skip_phase(index, SKIPPED_BY_CONFIGURATION);
            }
        }

        let total = pre_skipped.iter().filter(|skipped| !**skipped).count();
        tracing::info!(
            target: TRACING_TARGET,
            scheduled = total,
            skipped = phases.len() - total,
            "Starting workflow"
        );

        let mut position = 0;
        let mut cancelled = false;

        for (index, phase) in phases.iter().enumerate() {
            if pre_skipped[index] {
                continue;
            }

            if cancel.is_cancelled() {
                tracing::warn!(target: TRACING_TARGET, phase = phase.name(), "Run cancelled before phase started");
                run.skip_phase(index, "run cancelled");
                run.skip_remaining(index, "run cancelled");
                cancelled = true;
                break;
            }

            position += 1;
            let progress = Progress {
                position,
                total,
                phase: phase.name().to_owned(),
            };
            self.progress.phase_started(&progress);
            run.begin_phase(index);

            let started = Instant::now();
            let execution = self.execute(phase, state, cancel).await;
            let duration = started.elapsed();

            let status = self.complete(&mut run, index, phase, execution, duration);
            self.progress.phase_finished(&progress, status);

            match status {
                PhaseStatus::Cancelled => {
                    run.skip_remaining(index, "run cancelled");
                    cancelled = true;
                    break;
                }
                PhaseStatus::Failed if phase.is_fatal() => {
                    tracing::error!(
                        target: TRACING_TARGET,
                        phase = phase.name(),
                        "Fatal phase failed, skipping remaining phases"
                    );
                    let reason = format!("halted after `{}` failed", phase.name());
                    run.skip_remaining(index, &reason);
                    break;
                }
                _ => {}
            }
        }

        run.finish(cancelled);
        tracing::info!(
            target: TRACING_TARGET,
            status = %run.status(),
            errors = run.errors().len(),
            "Workflow finished"
        );

        if let Some(finalizer) = workflow.finalizer_ref() {
            let scope = finalizer.name().to_owned();
            let result = AssertUnwindSafe(finalizer.finalize(state, &run))
                .catch_unwind()
                .await;

            let error = match result {
                Ok(Ok(())) => None,
                Ok(Err(error)) => Some(error),
                Err(panic) => Some(WorkflowError::from_panic(panic)),
            };
            if let Some(error) = error {
                tracing::error!(target: TRACING_TARGET, error = %error, "Finalizer failed");
                run.errors().record(error.or_phase(&scope));
            }
        }

        run
    }

    /// Runs every attempt of one phase.
    async fn execute<S: Send>(
        &self,
        phase: &PhaseDefinition<S>,
        state: &mut S,
        cancel: &CancellationToken,
    ) -> Execution {
        let max_attempts = phase.retries().unwrap_or(self.config.max_retries) + 1;
        let mut attempt_number = 1;

        loop {
            let ctx = PhaseContext::new(phase.name(), attempt_number, cancel.clone());
            let attempt = self.attempt(phase, state, &ctx, cancel).await;

            let retry = matches!(attempt, Attempt::Failed(_)) && attempt_number < max_attempts;
            if !retry {
                return Execution {
                    attempt,
                    attempts: attempt_number,
                    errors: ctx.take_errors(),
                };
            }

            tracing::warn!(
                target: TRACING_TARGET,
                phase = phase.name(),
                attempt = attempt_number,
                max_attempts,
                errors = ctx.recorded(),
                "Phase attempt failed, retrying"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Execution {
                        attempt: Attempt::Cancelled,
                        attempts: attempt_number,
                        errors: ctx.take_errors(),
                    };
                }
                () = tokio::time::sleep(self.config.retry_delay) => {}
            }

            attempt_number += 1;
        }
    }

    /// Runs a single attempt, guarding against panics, timeouts and cancellation.
    async fn attempt<S: Send>(
        &self,
        phase: &PhaseDefinition<S>,
        state: &mut S,
        ctx: &PhaseContext,
        cancel: &CancellationToken,
    ) -> Attempt {
        let timeout = phase.timeout().or(self.config.phase_timeout);
        let guarded = AssertUnwindSafe(phase.runner().run(state, ctx)).catch_unwind();
        let limited = async {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, guarded).await.ok(),
                None => Some(guarded.await),
            }
        };

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Attempt::Cancelled,
            result = limited => result,
        };

        match result {
            None => Attempt::Failed(Some(timed_out(phase, timeout))),
            Some(Err(panic)) => Attempt::Failed(Some(WorkflowError::from_panic(panic))),
            Some(Ok(outcome)) => interpret(outcome),
        }
    }

    /// Moves an execution into the run and returns the phase's terminal status.
    fn complete<S>(
        &self,
        run: &mut WorkflowRun,
        index: usize,
        phase: &PhaseDefinition<S>,
        execution: Execution,
        duration: Duration,
    ) -> PhaseStatus {
        let Execution {
            attempt,
            attempts,
            mut errors,
        } = execution;

        let (status, output, skip_reason, fatal) = match attempt {
            Attempt::Succeeded(output) => (PhaseStatus::Succeeded, output, None, false),
            Attempt::Skipped(reason) => (PhaseStatus::Skipped, None, Some(reason), false),
            Attempt::Cancelled => (PhaseStatus::Cancelled, None, None, false),
            Attempt::Failed(returned) => {
                errors.extend(returned);
                if errors.is_empty() {
                    errors.push(WorkflowError::new(
                        phase.category(),
                        format!("phase `{}` failed without reporting an error", phase.name()),
                    ));
                }
                (PhaseStatus::Failed, None, None, phase.is_fatal())
            }
        };

        let ids: Vec<ErrorId> = errors
            .into_iter()
            .map(|error| {
                let error = error.or_phase(phase.name());
                if fatal {
                    run.errors().record_fatal(error)
                } else {
                    run.errors().record(error)
                }
            })
            .collect();

        tracing::debug!(
            target: TRACING_TARGET,
            phase = phase.name(),
            status = %status,
            attempts,
            errors = ids.len(),
            duration_ms = duration.as_millis() as u64,
            "Phase completed"
        );

        run.complete_phase(
            index,
            PhaseCompletion {
                status,
                duration,
                attempts,
                output,
                error: (status == PhaseStatus::Failed).then(|| ids.first().copied()).flatten(),
                skip_reason,
            },
        );

        status
    }
}

fn interpret(outcome: WorkflowResult<PhaseOutcome>) -> Attempt {
    match outcome {
        Ok(PhaseOutcome::Succeeded(output)) => Attempt::Succeeded(output),
        Ok(PhaseOutcome::Skipped(reason)) => Attempt::Skipped(reason),
        Ok(PhaseOutcome::Failed) => Attempt::Failed(None),
        Err(error) => Attempt::Failed(Some(error)),
    }
}

fn timed_out<S>(phase: &PhaseDefinition<S>, timeout: Option<Duration>) -> WorkflowError {
    let limit = timeout.unwrap_or_default();
    WorkflowError::new(
        phase.category(),
        format!("phase `{}` timed out after {}s", phase.name(), limit.as_secs()),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use tally_core::run::{EXIT_CANCELLED, EXIT_FAILURE, EXIT_SUCCESS};
    use tally_core::{ErrorCategory, RunStatus};

    use super::*;
    use crate::engine::phase::{PhaseRunner, RunFinalizer};

    #[derive(Debug, Default)]
    struct Journal {
        ran: Vec<String>,
        finalized: u32,
    }

    struct Succeed;

    #[async_trait::async_trait]
    impl PhaseRunner<Journal> for Succeed {
        async fn run(&self, state: &mut Journal, ctx: &PhaseContext) -> WorkflowResult<PhaseOutcome> {
            state.ran.push(ctx.phase().to_owned());
            Ok(PhaseOutcome::succeeded())
        }
    }

    struct Fail(ErrorCategory);

    #[async_trait::async_trait]
    impl PhaseRunner<Journal> for Fail {
        async fn run(&self, state: &mut Journal, ctx: &PhaseContext) -> WorkflowResult<PhaseOutcome> {
            state.ran.push(ctx.phase().to_owned());
            Err(WorkflowError::new(self.0, "exited with code 1"))
        }
    }

    struct FanOutFailure;

    #[async_trait::async_trait]
    impl PhaseRunner<Journal> for FanOutFailure {
        async fn run(&self, _: &mut Journal, ctx: &PhaseContext) -> WorkflowResult<PhaseOutcome> {
            ctx.record(WorkflowError::quality_check("lint failed"));
            ctx.record(WorkflowError::quality_check("tests failed"));
            Ok(PhaseOutcome::failed())
        }
    }

    struct SilentFailure;

    #[async_trait::async_trait]
    impl PhaseRunner<Journal> for SilentFailure {
        async fn run(&self, _: &mut Journal, _: &PhaseContext) -> WorkflowResult<PhaseOutcome> {
            Ok(PhaseOutcome::failed())
        }
    }

    struct Panic;

    #[async_trait::async_trait]
    impl PhaseRunner<Journal> for Panic {
        async fn run(&self, _: &mut Journal, _: &PhaseContext) -> WorkflowResult<PhaseOutcome> {
            panic!("unexpected report shape");
        }
    }

    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl PhaseRunner<Journal> for Flaky {
        async fn run(&self, _: &mut Journal, ctx: &PhaseContext) -> WorkflowResult<PhaseOutcome> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                ctx.record(WorkflowError::deployment(format!("attempt {} failed", ctx.attempt())));
                return Ok(PhaseOutcome::failed());
            }
            Ok(PhaseOutcome::with_data(serde_json::json!({ "attempt": ctx.attempt() })))
        }
    }

    struct Hang;

    #[async_trait::async_trait]
    impl PhaseRunner<Journal> for Hang {
        async fn run(&self, _: &mut Journal, _: &PhaseContext) -> WorkflowResult<PhaseOutcome> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(PhaseOutcome::succeeded())
        }
    }

    struct CancelDuring;

    #[async_trait::async_trait]
    impl PhaseRunner<Journal> for CancelDuring {
        async fn run(&self, _: &mut Journal, ctx: &PhaseContext) -> WorkflowResult<PhaseOutcome> {
            ctx.cancellation().cancel();
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(PhaseOutcome::succeeded())
        }
    }

    struct CountFinalize;

    #[async_trait::async_trait]
    impl RunFinalizer<Journal> for CountFinalize {
        async fn finalize(&self, state: &mut Journal, run: &WorkflowRun) -> WorkflowResult<()> {
            assert_ne!(run.status(), RunStatus::Running);
            state.finalized += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingProgress(Mutex<Vec<Progress>>);

    impl ProgressSink for RecordingProgress {
        fn phase_started(&self, progress: &Progress) {
            self.0.lock().unwrap().push(progress.clone());
        }
    }

    fn engine() -> Engine {
        Engine::new(EngineConfig {
            retry_delay: Duration::from_millis(1),
            ..EngineConfig::default()
        })
    }

    fn five_phases(third: impl PhaseRunner<Journal> + 'static) -> Workflow<Journal> {
        Workflow::new()
            .phase(PhaseDefinition::new("setup", Succeed))
            .phase(PhaseDefinition::new("auth", Succeed).skippable())
            .phase(PhaseDefinition::new("build", third).with_category(ErrorCategory::Build))
            .phase(PhaseDefinition::new("deploy", Succeed))
            .phase(PhaseDefinition::new("cleanup", Succeed).fatal(false))
            .finalizer(CountFinalize)
    }

    #[tokio::test]
    async fn fatal_failure_skips_the_rest() {
        let mut journal = Journal::default();
        let workflow = five_phases(Fail(ErrorCategory::Build));

        let run = engine()
            .run(&workflow, &mut journal, &CancellationToken::new())
            .await;

        let statuses: Vec<_> = run.phases().iter().map(|phase| phase.status).collect();
        assert_eq!(
            statuses,
            vec![
                PhaseStatus::Succeeded,
                PhaseStatus::Succeeded,
                PhaseStatus::Failed,
                PhaseStatus::Skipped,
                PhaseStatus::Skipped,
            ]
        );
        assert_eq!(journal.ran, vec!["setup", "auth", "build"]);
        assert_eq!(run.status(), RunStatus::Failed);
        assert_eq!(run.exit_code(), EXIT_FAILURE);

        let summary = run.errors().summarize();
        assert_eq!(summary.groups.len(), 1);
        assert_eq!(summary.groups[0].phase, "build");
        assert_eq!(summary.groups[0].categories[0].category, ErrorCategory::Build);
        assert_eq!(journal.finalized, 1);
    }

    #[tokio::test]
    async fn non_fatal_failure_continues_and_exits_zero() {
        let mut journal = Journal::default();
        let workflow = Workflow::new()
            .phase(PhaseDefinition::new("quality-checks", FanOutFailure).fatal(false))
            .phase(PhaseDefinition::new("build", Succeed));

        let run = engine()
            .run(&workflow, &mut journal, &CancellationToken::new())
            .await;

        assert_eq!(run.phases()[0].status, PhaseStatus::Failed);
        assert_eq!(run.phases()[1].status, PhaseStatus::Succeeded);
        assert_eq!(run.errors().count_for_phase("quality-checks"), 2);
        assert_eq!(run.status(), RunStatus::Succeeded);
        assert_eq!(run.exit_code(), EXIT_SUCCESS);
    }

    #[tokio::test]
    async fn progress_total_excludes_skipped_phases() {
        let mut journal = Journal::default();
        let progress = Arc::new(RecordingProgress::default());
        let workflow = Workflow::new()
            .phase(PhaseDefinition::new("setup", Succeed))
            .phase(PhaseDefinition::new("auth", Succeed).skippable())
            .phase(PhaseDefinition::new("quality-checks", Succeed).skippable())
            .phase(PhaseDefinition::new("build", Succeed))
            .skip_all(["auth", "quality-checks", "build"]);

        let run = engine()
            .with_progress(progress.clone())
            .run(&workflow, &mut journal, &CancellationToken::new())
            .await;

        let seen = progress.0.lock().unwrap().clone();
        let ratios: Vec<_> = seen.iter().map(|p| (p.position, p.total)).collect();
        assert_eq!(ratios, vec![(1, 2), (2, 2)]);
        assert_eq!(journal.ran, vec!["setup", "build"]);
        assert_eq!(run.phases()[1].status, PhaseStatus::Skipped);
        assert_eq!(run.phases()[1].duration, Duration::ZERO);
        assert_eq!(
            run.phases()[2].skip_reason.as_deref(),
            Some(SKIPPED_BY_CONFIGURATION)
        );
    }

    #[tokio::test]
    async fn panics_become_unknown_errors() {
        let mut journal = Journal::default();
        let workflow = five_phases(Panic);

        let run = engine()
            .run(&workflow, &mut journal, &CancellationToken::new())
            .await;

        let entries = run.errors().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, ErrorCategory::Unknown);
        assert!(entries[0].message.contains("unexpected report shape"));
        assert_eq!(run.phases()[2].status, PhaseStatus::Failed);
        assert_eq!(journal.finalized, 1);
    }

    #[tokio::test]
    async fn silent_failures_are_still_recorded() {
        let mut journal = Journal::default();
        let workflow = five_phases(SilentFailure);

        let run = engine()
            .run(&workflow, &mut journal, &CancellationToken::new())
            .await;

        let entries = run.errors().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, ErrorCategory::Build);
        assert_eq!(run.phases()[2].error, Some(entries[0].id));
    }

    #[tokio::test]
    async fn retries_drop_intermediate_errors() {
        let mut journal = Journal::default();
        let workflow = Workflow::new().phase(
            PhaseDefinition::new(
                "deploy",
                Flaky {
                    failures: 2,
                    calls: AtomicU32::new(0),
                },
            )
            .with_retries(2),
        );

        let run = engine()
            .run(&workflow, &mut journal, &CancellationToken::new())
            .await;

        let deploy = &run.phases()[0];
        assert_eq!(deploy.status, PhaseStatus::Succeeded);
        assert_eq!(deploy.attempts, 3);
        assert_eq!(deploy.output, Some(serde_json::json!({ "attempt": 3 })));
        assert!(run.errors().is_empty());
    }

    #[tokio::test]
    async fn timeouts_use_the_phase_category() {
        let mut journal = Journal::default();
        let workflow = Workflow::new().phase(
            PhaseDefinition::new("build", Hang)
                .with_category(ErrorCategory::Build)
                .with_timeout(Duration::from_millis(20)),
        );

        let run = engine()
            .run(&workflow, &mut journal, &CancellationToken::new())
            .await;

        let entries = run.errors().entries();
        assert_eq!(entries[0].category, ErrorCategory::Build);
        assert!(entries[0].message.contains("timed out"));
        assert_eq!(run.status(), RunStatus::Failed);
    }

    #[tokio::test]
    async fn cancellation_marks_current_phase_and_still_finalizes() {
        let mut journal = Journal::default();
        let workflow = five_phases(CancelDuring);

        let run = engine()
            .run(&workflow, &mut journal, &CancellationToken::new())
            .await;

        assert_eq!(run.phases()[2].status, PhaseStatus::Cancelled);
        assert_eq!(run.phases()[3].status, PhaseStatus::Skipped);
        assert_eq!(run.status(), RunStatus::Cancelled);
        assert_eq!(run.exit_code(), EXIT_CANCELLED);
        assert_eq!(journal.finalized, 1);
    }

    #[tokio::test]
    async fn non_skippable_phases_ignore_skip_requests() {
        let mut journal = Journal::default();
        let workflow = five_phases(Succeed).skip("setup").skip("auth");

        let run = engine()
            .run(&workflow, &mut journal, &CancellationToken::new())
            .await;

        assert_eq!(run.phases()[0].status, PhaseStatus::Succeeded);
        assert_eq!(run.phases()[1].status, PhaseStatus::Skipped);
        assert_eq!(run.exit_code(), EXIT_SUCCESS);
    }
}
