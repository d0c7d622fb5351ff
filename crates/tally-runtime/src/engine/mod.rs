//! Workflow step engine.
//!
//! This module sequences phases for one run:
//! - [`Workflow`]: ordered [`PhaseDefinition`]s, skip requests and a [`RunFinalizer`]
//! - [`Engine`]: executes a workflow, applying retries, timeouts and cancellation
//! - [`EngineConfig`]: engine-wide defaults
//! - [`ProgressSink`]: receives "step i of N" updates

mod config;
mod executor;
mod phase;
mod progress;
mod workflow;

pub use config::{DEFAULT_RETRY_DELAY, EngineConfig, EngineConfigBuilder, EngineConfigBuilderError};
pub use executor::Engine;
pub use phase::{PhaseContext, PhaseDefinition, PhaseOutcome, PhaseRunner, RunFinalizer};
pub use progress::{LogProgress, Progress, ProgressSink};
pub use workflow::{SKIPPED_BY_CONFIGURATION, Workflow};

/// Tracing target for engine operations.
pub const TRACING_TARGET: &str = "tally_runtime::engine";
