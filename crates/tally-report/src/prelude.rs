//! Prelude module for convenient imports.
//!
//! ```rust
//! use tally_report::prelude::*;
//! ```

pub use crate::collector::{CollectedReports, ReportCollector, ReportPaths};
pub use crate::config::ReportConfig;
pub use crate::dashboard::{ConsolidatedDashboard, Section, consolidate};
pub use crate::error::{ReportError, ReportResult};
pub use crate::kind::ReportKind;
pub use crate::render::{DashboardFormat, write_dashboard};
pub use crate::state::ReportState;
