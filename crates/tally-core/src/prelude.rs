//! Prelude module for convenient imports.
//!
//! ```rust
//! use tally_core::prelude::*;
//! ```

pub use crate::error::{ErrorCategory, WorkflowError, WorkflowResult};
pub use crate::process::{CommandOutput, CommandRunner, CommandSpec};
pub use crate::run::{PhaseStatus, RunStatus, RunSummary, WorkflowRun};
pub use crate::tracker::{ErrorSummary, ErrorTracker};
