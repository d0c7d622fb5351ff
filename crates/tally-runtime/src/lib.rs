#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod engine;
pub mod pipeline;

#[doc(hidden)]
pub mod prelude;

pub use engine::{Engine, EngineConfig, Workflow};
pub use pipeline::{PipelineConfig, PipelineState, build_pipeline};

/// Tracing target for runtime operations.
pub const TRACING_TARGET: &str = "tally_runtime";
