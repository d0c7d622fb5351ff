//! Progress reporting.

use std::fmt;

use tally_core::PhaseStatus;

use super::TRACING_TARGET;

/// Position of a phase among the phases actually scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// One-based position of the phase.
    pub position: usize,
    /// Number of scheduled phases, pre-skipped ones excluded.
    pub total: usize,
    /// Phase name.
    pub phase: String,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} of {}: {}", self.position, self.total, self.phase)
    }
}

/// Receives progress updates from the engine.
pub trait ProgressSink: Send + Sync {
    /// Called right before a scheduled phase starts.
    fn phase_started(&self, progress: &Progress);

    /// Called once a scheduled phase reached a terminal status.
    fn phase_finished(&self, progress: &Progress, status: PhaseStatus) {
        let _ = (progress, status);
    }
}

/// Emits progress as `info` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn phase_started(&self, progress: &Progress) {
        tracing::info!(
            target: TRACING_TARGET,
            step = progress.position,
            total = progress.total,
            phase = %progress.phase,
            "Starting {progress}"
        );
    }

    fn phase_finished(&self, progress: &Progress, status: PhaseStatus) {
        tracing::info!(
            target: TRACING_TARGET,
            step = progress.position,
            total = progress.total,
            phase = %progress.phase,
            status = %status,
            "Finished {progress}"
        );
    }
}
