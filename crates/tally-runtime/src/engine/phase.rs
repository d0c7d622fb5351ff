//! Phase definitions and the context handed to phase runners.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tally_core::{ErrorCategory, WorkflowError, WorkflowResult, WorkflowRun};
use tokio_util::sync::CancellationToken;

/// What a phase runner reports when it returns normally.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseOutcome {
    /// The phase did its work, optionally producing structured data.
    Succeeded(Option<Value>),
    /// The phase failed after recording its own errors in the context.
    Failed,
    /// The phase decided at run time that there was nothing to do.
    Skipped(String),
}

impl PhaseOutcome {
    /// A successful phase without data.
    pub fn succeeded() -> Self {
        Self::Succeeded(None)
    }

    /// A successful phase with structured data.
    pub fn with_data(data: Value) -> Self {
        Self::Succeeded(Some(data))
    }

    /// A failed phase whose errors were recorded through [`PhaseContext::record`].
    pub fn failed() -> Self {
        Self::Failed
    }

    /// A phase that skipped itself.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }
}

/// Executes one phase against the pipeline state `S`.
///
/// Returning `Err` is equivalent to recording the error and returning
/// [`PhaseOutcome::Failed`].
#[async_trait::async_trait]
pub trait PhaseRunner<S>: Send + Sync {
    /// Runs a single attempt of the phase.
    async fn run(&self, state: &mut S, ctx: &PhaseContext) -> WorkflowResult<PhaseOutcome>;
}

/// Runs once after every phase finished, failed, or was cancelled.
#[async_trait::async_trait]
pub trait RunFinalizer<S>: Send + Sync {
    /// Scope recorded on errors the finalizer returns.
    fn name(&self) -> &str {
        "finalize"
    }

    /// Finalizes the run. The run is already in its terminal state.
    async fn finalize(&self, state: &mut S, run: &WorkflowRun) -> WorkflowResult<()>;
}

/// A named phase and its execution policy.
pub struct PhaseDefinition<S> {
    name: String,
    runner: Arc<dyn PhaseRunner<S>>,
    fatal: bool,
    skippable: bool,
    retries: Option<u32>,
    timeout: Option<Duration>,
    category: ErrorCategory,
}

impl<S> std::fmt::Debug for PhaseDefinition<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseDefinition")
            .field("name", &self.name)
            .field("fatal", &self.fatal)
            .field("skippable", &self.skippable)
            .field("retries", &self.retries)
            .field("timeout", &self.timeout)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

impl<S> PhaseDefinition<S> {
    /// Creates a fatal, non-skippable phase.
    pub fn new(name: impl Into<String>, runner: impl PhaseRunner<S> + 'static) -> Self {
        Self {
            name: name.into(),
            runner: Arc::new(runner),
            fatal: true,
            skippable: false,
            retries: None,
            timeout: None,
            category: ErrorCategory::Unknown,
        }
    }

    /// Sets whether a failure halts the run.
    pub fn fatal(mut self, fatal: bool) -> Self {
        self.fatal = fatal;
        self
    }

    /// Allows the phase to be skipped by configuration.
    pub fn skippable(mut self) -> Self {
        self.skippable = true;
        self
    }

    /// Overrides the engine's retry count.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Overrides the engine's per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the category of errors the engine raises for this phase.
    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = category;
        self
    }

    /// Returns the phase name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the runner.
    pub fn runner(&self) -> &dyn PhaseRunner<S> {
        self.runner.as_ref()
    }

    /// Returns whether a failure halts the run.
    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    /// Returns whether configuration may skip the phase.
    pub fn is_skippable(&self) -> bool {
        self.skippable
    }

    /// Returns the retry override.
    pub fn retries(&self) -> Option<u32> {
        self.retries
    }

    /// Returns the timeout override.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the category of engine-raised errors.
    pub fn category(&self) -> ErrorCategory {
        self.category
    }
}

/// Per-attempt handle a runner uses to report errors and observe cancellation.
///
/// Clones share the same error buffer, so fan-out sub-operations can each hold
/// one. The engine moves buffered errors into the run's tracker once the
/// attempt is final; errors of a retried attempt are dropped.
#[derive(Debug, Clone)]
pub struct PhaseContext {
    phase: Arc<str>,
    attempt: u32,
    cancel: CancellationToken,
    errors: Arc<Mutex<Vec<WorkflowError>>>,
}

impl PhaseContext {
    /// Creates a context for one attempt of `phase`.
    pub fn new(phase: &str, attempt: u32, cancel: CancellationToken) -> Self {
        Self {
            phase: Arc::from(phase),
            attempt,
            cancel,
            errors: Arc::default(),
        }
    }

    /// Returns the phase name.
    pub fn phase(&self) -> &str {
        &self.phase
    }

    /// Returns the attempt number, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the run's cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns whether the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Records an error of this phase.
    pub fn record(&self, error: WorkflowError) {
        let error = error.or_phase(self.phase.as_ref());
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error);
    }

    /// Returns the number of errors recorded in this attempt.
    pub fn recorded(&self) -> usize {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub(crate) fn take_errors(&self) -> Vec<WorkflowError> {
        std::mem::take(&mut *self.errors.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
