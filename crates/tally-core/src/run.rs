//! Run model: one pipeline execution and the phases it went through.

use std::time::Duration;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

use crate::tracker::{ErrorId, ErrorSummary, ErrorTracker};

/// Exit code of a run that finished without fatal errors.
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code of a run with at least one fatal error.
pub const EXIT_FAILURE: i32 = 1;

/// Exit code of a run stopped by a user interrupt.
pub const EXIT_CANCELLED: i32 = 130;

/// Lifecycle state of a single phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(AsRefStr, Display, EnumString, IntoStaticStr)]
#[derive(Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// Scheduled but not started.
    #[default]
    Pending,
    /// Currently executing.
    Running,
    /// Not executed, either by request or because an earlier phase halted the run.
    Skipped,
    /// Finished successfully.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Interrupted while running.
    Cancelled,
}

impl PhaseStatus {
    /// Returns whether the status can no longer change.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Skipped | Self::Succeeded | Self::Failed | Self::Cancelled
        )
    }
}

/// Overall state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(AsRefStr, Display, EnumString, IntoStaticStr)]
#[derive(Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Phases are still being executed.
    #[default]
    Running,
    /// Every fatal phase succeeded.
    Succeeded,
    /// A fatal phase failed.
    Failed,
    /// The run was interrupted.
    Cancelled,
}

/// Result of one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    /// Phase name.
    pub name: String,
    /// Current status.
    pub status: PhaseStatus,
    /// Whether a failure of this phase halts the run.
    pub fatal: bool,
    /// Wall-clock time spent, zero for skipped phases.
    #[serde(with = "iso_duration")]
    pub duration: Duration,
    /// Number of attempts made, including retries.
    pub attempts: u32,
    /// Structured output produced by the phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// The error that failed the phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorId>,
    /// Why the phase was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl PhaseRecord {
    /// Creates a pending record.
    pub fn pending(name: impl Into<String>, fatal: bool) -> Self {
        Self {
            name: name.into(),
            status: PhaseStatus::Pending,
            fatal,
            duration: Duration::ZERO,
            attempts: 0,
            output: None,
            error: None,
            skip_reason: None,
        }
    }
}

/// One pipeline execution.
///
/// Constructed when the engine starts, mutated only by the engine as phases
/// complete, and terminal once [`WorkflowRun::finish`] was called.
#[derive(Debug)]
pub struct WorkflowRun {
    phases: Vec<PhaseRecord>,
    status: RunStatus,
    started_at: Timestamp,
    ended_at: Option<Timestamp>,
    errors: ErrorTracker,
}

impl WorkflowRun {
    /// Starts a run with the given phases, all pending.
    pub fn start(phases: impl IntoIterator<Item = PhaseRecord>) -> Self {
        Self {
            phases: phases.into_iter().collect(),
            status: RunStatus::Running,
            started_at: Timestamp::now(),
            ended_at: None,
            errors: ErrorTracker::new(),
        }
    }

    /// Returns the phases in execution order.
    pub fn phases(&self) -> &[PhaseRecord] {
        &self.phases
    }

    /// Returns the phase with the given name.
    pub fn phase(&self, name: &str) -> Option<&PhaseRecord> {
        self.phases.iter().find(|phase| phase.name == name)
    }

    /// Returns the overall status.
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Returns when the run started.
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// Returns when the run ended, if it did.
    pub fn ended_at(&self) -> Option<Timestamp> {
        self.ended_at
    }

    /// Returns the run's error tracker.
    pub fn errors(&self) -> &ErrorTracker {
        &self.errors
    }

    /// Marks the phase at `index` as running.
    pub fn begin_phase(&mut self, index: usize) {
        if let Some(phase) = self.phases.get_mut(index)
            && !phase.status.is_terminal()
        {
            phase.status = PhaseStatus::Running;
        }
    }

    /// Moves the phase at `index` into a terminal state.
    ///
    /// Records that are already terminal are left untouched.
    pub fn complete_phase(&mut self, index: usize, completion: PhaseCompletion) {
        let Some(phase) = self.phases.get_mut(index) else {
            return;
        };
        if phase.status.is_terminal() {
            return;
        }

        phase.status = completion.status;
        phase.duration = completion.duration;
        phase.attempts = completion.attempts;
        phase.output = completion.output;
        phase.error = completion.error;
        phase.skip_reason = completion.skip_reason;
    }

    /// Marks the phase at `index` as skipped without running it.
    pub fn skip_phase(&mut self, index: usize, reason: impl Into<String>) {
        self.complete_phase(index, PhaseCompletion::skipped(reason));
    }

    /// Marks every non-terminal phase after `index` as skipped.
    pub fn skip_remaining(&mut self, index: usize, reason: &str) {
        for position in index + 1..self.phases.len() {
            self.skip_phase(position, reason);
        }
    }

    /// Finalizes the run: ends the clock and derives the terminal status.
    pub fn finish(&mut self, cancelled: bool) {
        self.ended_at = Some(Timestamp::now());
        self.status = if cancelled {
            RunStatus::Cancelled
        } else if self.has_fatal_failure() {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        };
    }

    /// Returns whether a fatal error was recorded or a fatal phase failed.
    pub fn has_fatal_failure(&self) -> bool {
        self.errors.has_fatal()
            || self
                .phases
                .iter()
                .any(|phase| phase.fatal && phase.status == PhaseStatus::Failed)
    }

    /// Returns the process exit code for this run.
    pub fn exit_code(&self) -> i32 {
        if self.status == RunStatus::Cancelled {
            EXIT_CANCELLED
        } else if self.has_fatal_failure() {
            EXIT_FAILURE
        } else {
            EXIT_SUCCESS
        }
    }

    /// Returns a serializable, read-only snapshot of the run.
    pub fn summary(&self) -> RunSummary {
        let ended_at = self.ended_at.unwrap_or(self.started_at);
        let duration = ended_at
            .duration_since(self.started_at)
            .unsigned_abs();

        RunSummary {
            status: self.status,
            started_at: self.started_at,
            ended_at: self.ended_at,
            duration,
            phases: self.phases.clone(),
            errors: self.errors.summarize(),
            exit_code: self.exit_code(),
        }
    }
}

/// Terminal data for a phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseCompletion {
    /// Terminal status.
    pub status: PhaseStatus,
    /// Wall-clock time spent.
    pub duration: Duration,
    /// Number of attempts made.
    pub attempts: u32,
    /// Structured output.
    pub output: Option<serde_json::Value>,
    /// The error that failed the phase.
    pub error: Option<ErrorId>,
    /// Why the phase was skipped.
    pub skip_reason: Option<String>,
}

impl PhaseCompletion {
    /// A phase that never ran.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: PhaseStatus::Skipped,
            duration: Duration::ZERO,
            attempts: 0,
            output: None,
            error: None,
            skip_reason: Some(reason.into()),
        }
    }
}

/// Read-only snapshot of a run, as consumed by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Terminal (or current) status.
    pub status: RunStatus,
    /// When the run started.
    pub started_at: Timestamp,
    /// When the run ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<Timestamp>,
    /// Total wall-clock time.
    #[serde(with = "iso_duration")]
    pub duration: Duration,
    /// Phases in execution order.
    pub phases: Vec<PhaseRecord>,
    /// Grouped errors.
    pub errors: ErrorSummary,
    /// Process exit code.
    pub exit_code: i32,
}

impl RunSummary {
    /// Returns the number of phases with the given status.
    pub fn count(&self, status: PhaseStatus) -> usize {
        self.phases
            .iter()
            .filter(|phase| phase.status == status)
            .count()
    }
}

/// Durations as ISO 8601 strings through [`SignedDuration`], keeping nanoseconds.
mod iso_duration {
    use std::time::Duration;

    use jiff::SignedDuration;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        SignedDuration::try_from(*duration)
            .unwrap_or(SignedDuration::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let signed = SignedDuration::deserialize(deserializer)?;
        Duration::try_from(signed).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WorkflowError;

    fn run() -> WorkflowRun {
        WorkflowRun::start([
            PhaseRecord::pending("setup", true),
            PhaseRecord::pending("quality-checks", false),
            PhaseRecord::pending("build", true),
        ])
    }

    fn completion(status: PhaseStatus) -> PhaseCompletion {
        PhaseCompletion {
            status,
            duration: Duration::from_millis(5),
            attempts: 1,
            output: None,
            error: None,
            skip_reason: None,
        }
    }

    #[test]
    fn terminal_phases_are_immutable() {
        let mut run = run();
        run.begin_phase(0);
        run.complete_phase(0, completion(PhaseStatus::Succeeded));
        run.complete_phase(0, completion(PhaseStatus::Failed));
        run.begin_phase(0);

        assert_eq!(run.phases()[0].status, PhaseStatus::Succeeded);
    }

    #[test]
    fn non_fatal_failure_keeps_exit_code_zero() {
        let mut run = run();
        run.complete_phase(0, completion(PhaseStatus::Succeeded));
        run.errors()
            .record(WorkflowError::quality_check("lint").with_phase("quality-checks"));
        run.complete_phase(1, completion(PhaseStatus::Failed));
        run.complete_phase(2, completion(PhaseStatus::Succeeded));
        run.finish(false);

        assert_eq!(run.status(), RunStatus::Succeeded);
        assert_eq!(run.exit_code(), EXIT_SUCCESS);
    }

    #[test]
    fn fatal_failure_sets_exit_code() {
        let mut run = run();
        run.complete_phase(0, completion(PhaseStatus::Failed));
        run.skip_remaining(0, "halted");
        run.finish(false);

        assert_eq!(run.status(), RunStatus::Failed);
        assert_eq!(run.exit_code(), EXIT_FAILURE);
        assert_eq!(run.phases()[1].status, PhaseStatus::Skipped);
        assert_eq!(run.phases()[2].skip_reason.as_deref(), Some("halted"));
        assert_eq!(run.phases()[2].duration, Duration::ZERO);
    }

    #[test]
    fn cancellation_wins_over_success() {
        let mut run = run();
        run.complete_phase(0, completion(PhaseStatus::Cancelled));
        run.finish(true);

        assert_eq!(run.status(), RunStatus::Cancelled);
        assert_eq!(run.exit_code(), EXIT_CANCELLED);
    }

    #[test]
    fn summary_round_trips_through_json() {
        let mut run = run();
        run.complete_phase(
            0,
            PhaseCompletion {
                duration: Duration::from_nanos(17_697),
                ..completion(PhaseStatus::Succeeded)
            },
        );
        run.finish(false);

        let summary = run.summary();
        assert_eq!(summary.count(PhaseStatus::Succeeded), 1);
        assert_eq!(summary.count(PhaseStatus::Pending), 2);

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["phases"][0]["duration"].is_string());
        assert_eq!(json["phases"][0]["status"], "succeeded");

        let back: RunSummary = serde_json::from_value(json).unwrap();
        assert_eq!(back.phases[0].duration, Duration::from_nanos(17_697));
        assert_eq!(back, summary);
    }
}
