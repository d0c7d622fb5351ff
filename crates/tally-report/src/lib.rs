#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod collector;
mod config;
mod dashboard;
mod error;
mod kind;
mod render;
mod state;

pub mod payload;

#[doc(hidden)]
pub mod prelude;

pub use collector::{
    CollectedReports, DEFAULT_REPORT_DIR_NAME, ReportCollector, ReportPaths, default_report_dir,
};
pub use config::{DEFAULT_DASHBOARD_PATH, ReportConfig, URL_CACHE_FILE_NAME};
pub use dashboard::{
    BundleSummary, ConsolidatedDashboard, DeadCodeSummary, DocQualitySummary, PerformanceSummary,
    ReportSections, Section, VulnerabilitySummary, consolidate,
};
pub use error::{ReportError, ReportResult};
pub use kind::ReportKind;
pub use render::{DashboardFormat, render_markdown, write_dashboard};
pub use state::ReportState;

/// Tracing target for report collection and dashboard output.
pub const TRACING_TARGET: &str = "tally_report";
