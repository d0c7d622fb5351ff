#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;
pub mod process;
pub mod run;
mod tracker;

#[cfg(feature = "mock")]
#[cfg_attr(docsrs, doc(cfg(feature = "mock")))]
pub mod mock;

#[doc(hidden)]
pub mod prelude;

pub use error::{BoxedError, ErrorCategory, WorkflowError, WorkflowResult};
pub use process::{CommandOutput, CommandRunner, CommandSpec, ProcessError, ProcessRunner};
pub use run::{PhaseCompletion, PhaseRecord, PhaseStatus, RunStatus, RunSummary, WorkflowRun};
pub use tracker::{
    CategoryErrorGroup, ErrorEntry, ErrorId, ErrorSummary, ErrorTracker, PhaseErrorGroup,
    RecordedError,
};

/// Phase name used for errors raised outside of any phase.
pub const RUN_SCOPE: &str = "run";
