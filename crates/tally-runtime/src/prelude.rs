//! Prelude module for convenient imports.
//!
//! ```rust
//! use tally_runtime::prelude::*;
//! ```

pub use crate::engine::{
    Engine, EngineConfig, PhaseContext, PhaseDefinition, PhaseOutcome, PhaseRunner, RunFinalizer,
    Workflow,
};
pub use crate::pipeline::{CommandConfig, PipelineConfig, PipelineState, build_pipeline};
